//! Chat-completion models with native tool calling.

use crate::tools::ToolSpec;
use async_trait::async_trait;
use parley_types::{Message, ToolCall};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API key not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("no choices in response")]
    EmptyResponse,
}

/// One model reply: spoken text, tool requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelReply, ModelError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

#[derive(Debug, Serialize)]
struct NativeChatRequest<'a> {
    model: &'a str,
    messages: Vec<NativeMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<NativeToolSpec<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct NativeMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<NativeToolCall>>,
}

#[derive(Debug, Serialize)]
struct NativeToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: NativeToolFunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct NativeToolFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    function: NativeFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API transports them.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct NativeChatResponse {
    choices: Vec<NativeChoice>,
}

#[derive(Debug, Deserialize)]
struct NativeChoice {
    message: NativeResponseMessage,
}

#[derive(Debug, Deserialize)]
struct NativeResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<NativeToolCall>>,
}

fn convert_tools(tools: &[ToolSpec]) -> Option<Vec<NativeToolSpec<'_>>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| NativeToolSpec {
                kind: "function",
                function: NativeToolFunctionSpec {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.parameters,
                },
            })
            .collect(),
    )
}

fn convert_message(message: &Message) -> NativeMessage {
    let plain = |role, content: &str| NativeMessage {
        role,
        content: Some(content.to_string()),
        tool_call_id: None,
        name: None,
        tool_calls: None,
    };
    match message {
        Message::System { content } => plain("system", content),
        Message::User { content } => plain("user", content),
        Message::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => NativeMessage {
            role: "assistant",
            content: (!content.is_empty()).then(|| content.clone()),
            tool_call_id: None,
            name: None,
            tool_calls: Some(
                tool_calls
                    .iter()
                    .map(|call| NativeToolCall {
                        id: Some(call.id.clone()),
                        kind: Some("function".to_string()),
                        function: NativeFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            ),
        },
        Message::Assistant { content, .. } => plain("assistant", content),
        Message::ToolResult {
            call_id,
            name,
            payload,
        } => NativeMessage {
            role: "tool",
            content: Some(payload.to_string()),
            tool_call_id: Some(call_id.clone()),
            name: Some(name.clone()),
            tool_calls: None,
        },
    }
}

fn parse_native_response(message: NativeResponseMessage) -> ModelReply {
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    tracing::warn!(tool = %call.function.name, error = %e, "model sent malformed tool arguments");
                    Value::Object(Default::default())
                })
            };
            ToolCall {
                id: call.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    ModelReply {
        content: message.content.unwrap_or_default(),
        tool_calls,
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelReply, ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let native_tools = convert_tools(tools);
        let request = NativeChatRequest {
            model: &self.model,
            messages: messages.iter().map(convert_message).collect(),
            temperature: self.temperature,
            tool_choice: native_tools.as_ref().map(|_| "auto"),
            tools: native_tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let native: NativeChatResponse = response.json().await?;
        let message = native
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ModelError::EmptyResponse)?;
        Ok(parse_native_response(message))
    }
}
