//! Conversation message model and the tool result envelope.
//!
//! A conversation is an ordered `Vec<Message>`. Two invariants hold for any
//! history presented to the language model:
//!
//! - at most one [`Message::System`], always at index 0;
//! - every [`Message::ToolResult`] is immediately preceded (possibly through
//!   other tool results) by the [`Message::Assistant`] that requested it.

use crate::task::TaskRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back on the matching tool result.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// Arguments as a JSON object.
    #[serde(default)]
    pub arguments: Value,
}

/// One entry in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        name: String,
        payload: Value,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Builds the tool-result message for `call`, serializing the envelope
    /// as the payload the model will see.
    pub fn tool_result(call: &ToolCall, envelope: &ToolEnvelope) -> Self {
        Self::ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            payload: envelope.to_value(),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Tool calls requested by this message; empty for anything but an
    /// assistant reply.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            Self::System { .. } | Self::User { .. } | Self::ToolResult { .. } => &[],
        }
    }
}

/// Outcome status of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// The result envelope every tool returns.
///
/// Tool-specific fields live in `payload` and are flattened into the JSON
/// object the model sees, next to `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub status: ToolStatus,
    /// Sentence the assistant may speak verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoken_response: Option<String>,
    /// Asks the client to stop listening until re-activated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub standby: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Task created or updated by the call; surfaced on the `chunk` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRecord>,
    /// Report summary text; surfaced on the `chunk` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolEnvelope {
    pub fn success() -> Self {
        Self {
            status: ToolStatus::Success,
            spoken_response: None,
            standby: false,
            error: None,
            task: None,
            summary: None,
            payload: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            error: Some(message.into()),
            ..Self::success()
        }
    }

    /// Adds a tool-specific payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn spoken(mut self, text: impl Into<String>) -> Self {
        self.spoken_response = Some(text.into());
        self
    }

    pub fn with_task(mut self, task: TaskRecord) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn into_standby(mut self) -> Self {
        self.standby = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    pub fn to_value(&self) -> Value {
        // Serializing a plain struct of strings, bools and JSON values cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}
