use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use parley_agent::{ChatModel, ModelError, OpenAiChatModel, ToolSpec};
use parley_types::{Message, ToolCall, ToolEnvelope};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn spawn_api(status: StatusCode, reply: Value) -> (String, Captured) {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                move |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        captured.requests.lock().unwrap().push((auth, body));
                        (status, Json(reply))
                    }
                },
            ),
        )
        .with_state(captured.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}/v1"), captured)
}

fn weather_spec() -> ToolSpec {
    ToolSpec {
        name: "get_weather".into(),
        description: "Current weather".into(),
        parameters: json!({"type": "object", "properties": {"latitude": {"type": "number"}}}),
    }
}

#[tokio::test]
async fn sends_history_and_parses_tool_calls() {
    let (base_url, captured) = spawn_api(
        StatusCode::OK,
        json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"latitude\": 48.85, \"longitude\": 2.35}"}
                    }]
                }
            }]
        }),
    )
    .await;

    let model = OpenAiChatModel::new(&base_url, "sk-test", "gpt-4o-mini", 0.8).unwrap();
    let earlier = ToolCall {
        id: "call_1".into(),
        name: "get_current_tasks".into(),
        arguments: json!({}),
    };
    let history = vec![
        Message::system("You are Jarvis"),
        Message::user("what's on my list"),
        Message::assistant("", vec![earlier.clone()]),
        Message::tool_result(&earlier, &ToolEnvelope::success().with("tasks", json!([]))),
        Message::assistant("Nothing yet.", vec![]),
        Message::user("What's the weather in Paris?"),
    ];

    let reply = model.chat(&history, &[weather_spec()]).await.unwrap();
    assert_eq!(reply.content, "");
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].id, "call_9");
    assert_eq!(reply.tool_calls[0].arguments["latitude"], 48.85);

    let requests = captured.requests.lock().unwrap();
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["tool_choice"], "auto");
    assert_eq!(body["tools"][0]["function"]["name"], "get_weather");

    let roles: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "tool", "assistant", "user"]
    );
    assert_eq!(body["messages"][2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
}

#[tokio::test]
async fn plain_text_reply_without_tools() {
    let (base_url, captured) = spawn_api(
        StatusCode::OK,
        json!({"choices": [{"message": {"content": "Hey there!"}}]}),
    )
    .await;
    let model = OpenAiChatModel::new(&base_url, "sk-test", "gpt-4o-mini", 0.2).unwrap();

    let reply = model.chat(&[Message::user("hello")], &[]).await.unwrap();
    assert_eq!(reply.content, "Hey there!");
    assert!(reply.tool_calls.is_empty());

    let requests = captured.requests.lock().unwrap();
    assert!(requests[0].1.get("tools").is_none());
    assert!(requests[0].1.get("tool_choice").is_none());
}

#[tokio::test]
async fn api_errors_and_empty_choices_surface_as_model_errors() {
    let (base_url, _) = spawn_api(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"message": "slow down"}}),
    )
    .await;
    let model = OpenAiChatModel::new(&base_url, "sk-test", "gpt-4o-mini", 0.8).unwrap();
    match model.chat(&[Message::user("hi")], &[]).await {
        Err(ModelError::Api { status, body }) => {
            assert_eq!(status, 429);
            assert!(body.contains("slow down"));
        }
        other => panic!("expected API error, got {other:?}"),
    }

    let (base_url, _) = spawn_api(StatusCode::OK, json!({"choices": []})).await;
    let model = OpenAiChatModel::new(&base_url, "sk-test", "gpt-4o-mini", 0.8).unwrap();
    assert!(matches!(
        model.chat(&[Message::user("hi")], &[]).await,
        Err(ModelError::EmptyResponse)
    ));
}

#[tokio::test]
async fn missing_key_fails_without_network() {
    let model = OpenAiChatModel::new("http://127.0.0.1:9", "", "gpt-4o-mini", 0.8).unwrap();
    assert!(matches!(
        model.chat(&[Message::user("hi")], &[]).await,
        Err(ModelError::MissingApiKey)
    ));
}
