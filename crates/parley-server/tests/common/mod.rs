//! Shared harness: a real server on an ephemeral port with a scripted
//! language model and a scripted transcriber.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{extract::Query, routing::get, Json, Router};
use futures_util::{SinkExt, StreamExt};
use parley_agent::{ChatModel, ModelError, ModelReply, ToolSpec};
use parley_db::{create_pool, insert_user, run_migrations, DbPool, DbRuntimeSettings};
use parley_server::config::Config;
use parley_server::{app, AppState};
use parley_types::{Message, ToolCall};
use parley_voice::{
    ConnectorEvent, ConnectorFactory, RawTurn, StreamParams, TurnConnector, VoiceError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const JWT_SECRET: &str = "integration-secret";
pub const USER_EMAIL: &str = "ada@example.com";

/// One scripted model reply, optionally delayed.
pub enum Step {
    Reply(ModelReply),
    Fail,
    Stall(Duration, ModelReply),
}

#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// User messages the model saw on each call.
    pub fn user_messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|messages| {
                messages.iter().rev().find_map(|m| match m {
                    Message::User { content } => Some(content.clone()),
                    _ => None,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<ModelReply, ModelError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail) => Err(ModelError::EmptyResponse),
            Some(Step::Stall(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            None => Ok(ModelReply::text("")),
        }
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

struct ScriptedConnector {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    disconnects: Arc<Mutex<usize>>,
}

#[async_trait]
impl TurnConnector for ScriptedConnector {
    async fn stream(&self, frame: Vec<u8>) -> Result<(), VoiceError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }
}

/// Hands each new stream's event sender to the test.
pub struct ScriptedTranscriber {
    streams: mpsc::UnboundedSender<mpsc::Sender<ConnectorEvent>>,
    fail: bool,
    pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
    pub disconnects: Arc<Mutex<usize>>,
}

#[async_trait]
impl ConnectorFactory for ScriptedTranscriber {
    async fn connect(
        &self,
        _params: &StreamParams,
        events: mpsc::Sender<ConnectorEvent>,
    ) -> Result<Arc<dyn TurnConnector>, VoiceError> {
        if self.fail {
            return Err(VoiceError::Connect("scripted failure".into()));
        }
        events
            .send(ConnectorEvent::Opened {
                stream_id: Some("scripted".into()),
            })
            .await
            .map_err(|_| VoiceError::Closed)?;
        self.streams.send(events).map_err(|_| VoiceError::Closed)?;
        Ok(Arc::new(ScriptedConnector {
            frames: Arc::clone(&self.frames),
            disconnects: Arc::clone(&self.disconnects),
        }))
    }
}

pub struct Harness {
    pub addr: SocketAddr,
    pub state: AppState,
    pub pool: DbPool,
    pub model: Arc<ScriptedModel>,
    pub transcriber: Arc<ScriptedTranscriber>,
    streams: mpsc::UnboundedReceiver<mpsc::Sender<ConnectorEvent>>,
    _dir: tempfile::TempDir,
}

pub struct Options {
    pub turn_timeout_secs: u64,
    pub weather_base_url: Option<String>,
    pub transcriber_fails: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 5,
            weather_base_url: None,
            transcriber_fails: false,
        }
    }
}

pub async fn spawn(model: Arc<ScriptedModel>, options: Options) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parley.db");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        insert_user(&conn, USER_EMAIL, Some("Ada")).unwrap();
    }

    let mut config = Config::default();
    config.auth.jwt_secret = JWT_SECRET.into();
    config.agent.turn_timeout_secs = options.turn_timeout_secs;
    if let Some(url) = options.weather_base_url {
        config.tools.weather_base_url = url;
    }

    let (streams_tx, streams) = mpsc::unbounded_channel();
    let transcriber = Arc::new(ScriptedTranscriber {
        streams: streams_tx,
        fail: options.transcriber_fails,
        frames: Arc::default(),
        disconnects: Arc::default(),
    });

    let state = AppState::new(&config, pool.clone(), model.clone(), transcriber.clone()).unwrap();
    let router = app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Harness {
        addr,
        state,
        pool,
        model,
        transcriber,
        streams,
        _dir: dir,
    }
}

impl Harness {
    pub fn token(&self) -> String {
        self.state.auth.issue_token(USER_EMAIL, 3600).unwrap()
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// Connects, sends `handshake` and waits for the transcriber stream.
    pub async fn open(&mut self, handshake: Value) -> (Ws, mpsc::Sender<ConnectorEvent>) {
        let (mut ws, _) = connect_async(self.ws_url(&self.token()))
            .await
            .expect("failed to connect");
        ws.send(WsMessage::Text(handshake.to_string().into()))
            .await
            .unwrap();
        let events = tokio::time::timeout(Duration::from_secs(5), self.streams.recv())
            .await
            .expect("transcriber never connected")
            .unwrap();
        (ws, events)
    }
}

pub fn inbox_handshake() -> Value {
    json!({"projects": ["Inbox"], "tasks": [], "reports": []})
}

pub async fn say(events: &mpsc::Sender<ConnectorEvent>, turn: RawTurn) {
    events.send(ConnectorEvent::Turn(turn)).await.unwrap();
}

/// Next JSON event from the server.
pub async fn next_event(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("connection closed")
            .expect("websocket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Collects events up to and including the next terminal one.
pub async fn events_until_terminal(ws: &mut Ws) -> Vec<Value> {
    let mut events = Vec::new();
    loop {
        let event = next_event(ws).await;
        let terminal = event["type"] == "end" || event["type"] == "error";
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Asserts nothing arrives within `window`.
pub async fn assert_quiet(ws: &mut Ws, window: Duration) {
    if let Ok(Some(Ok(WsMessage::Text(text)))) = tokio::time::timeout(window, ws.next()).await {
        panic!("unexpected event: {text}");
    }
}

/// Fake Open-Meteo that records the coordinates it was asked for.
pub async fn spawn_weather() -> (String, Arc<Mutex<Vec<HashMap<String, String>>>>) {
    let requests: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let recorded = Arc::clone(&requests);
    let router = Router::new().route(
        "/forecast",
        get(move |Query(query): Query<HashMap<String, String>>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(query);
                Json(json!({"current": {"temperature_2m": 18.5, "weathercode": 2}}))
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), requests)
}
