//! AssemblyAI universal-streaming client.
//!
//! ## Protocol
//!
//! 1. **Connect**: WebSocket to `{url}?sample_rate=..&encoding=pcm_s16le&format_turns=true`
//!    with the API key in the `Authorization` header.
//! 2. **Stream**: raw PCM as binary frames.
//! 3. **Receive**: `Begin`, then `Turn { transcript, end_of_turn, turn_is_formatted }`
//!    messages, and `Termination` when the stream ends.
//! 4. **Close**: send `{"type":"Terminate"}` and close the socket.

use crate::config::AsrConfig;
use crate::connector::{ConnectorEvent, ConnectorFactory, RawTurn, StreamParams, TurnConnector};
use crate::error::VoiceError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one AssemblyAI stream per session.
#[derive(Debug, Clone)]
pub struct AssemblyAiFactory {
    config: AsrConfig,
}

impl AssemblyAiFactory {
    pub fn new(config: AsrConfig) -> Self {
        Self { config }
    }

    fn stream_url(&self, sample_rate: u32) -> String {
        let separator = if self.config.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}sample_rate={sample_rate}&encoding=pcm_s16le&format_turns=true",
            self.config.url
        )
    }
}

#[async_trait]
impl ConnectorFactory for AssemblyAiFactory {
    async fn connect(
        &self,
        params: &StreamParams,
        events: mpsc::Sender<ConnectorEvent>,
    ) -> Result<Arc<dyn TurnConnector>, VoiceError> {
        let url = self.stream_url(params.sample_rate);
        let mut request = url.as_str().into_client_request()?;
        if !self.config.api_key.is_empty() {
            let value = self
                .config
                .api_key
                .parse()
                .map_err(|e| VoiceError::Config(format!("invalid API key header: {e}")))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| VoiceError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();

        info!(session_id = %params.session_id, "transcriber connected");

        let session_id = params.session_id.to_string();
        tokio::spawn(read_loop(stream, events, session_id));

        Ok(Arc::new(AssemblyAiConnector {
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct AssemblyAiConnector {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    closed: AtomicBool,
}

#[async_trait]
impl TurnConnector for AssemblyAiConnector {
    async fn stream(&self, frame: Vec<u8>) -> Result<(), VoiceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VoiceError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(WsMessage::Binary(frame.into()))
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(r#"{"type":"Terminate"}"#.to_string().into()))
            .await?;
        sink.close().await?;
        Ok(())
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<ConnectorEvent>,
    session_id: String,
) {
    while let Some(message) = stream.next().await {
        let event = match message {
            Ok(WsMessage::Text(text)) => match parse_message(text.as_str()) {
                Some(event) => event,
                None => continue,
            },
            Ok(WsMessage::Close(frame)) => {
                debug!(session_id = %session_id, close_frame = ?frame, "transcriber closed the stream");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "transcriber stream error");
                let _ = events.send(ConnectorEvent::Error(e.to_string())).await;
                break;
            }
        };
        if events.send(event).await.is_err() {
            debug!(session_id = %session_id, "event receiver dropped, stopping transcriber reader");
            return;
        }
    }
    let _ = events.send(ConnectorEvent::Closed).await;
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type", alias = "message_type")]
    kind: Option<String>,
    id: Option<String>,
    transcript: Option<String>,
    text: Option<String>,
    end_of_turn: Option<bool>,
    turn_is_formatted: Option<bool>,
    error: Option<String>,
}

/// Maps one server message to a connector event. Unknown messages yield
/// `None`.
///
/// With `format_turns` enabled the service repeats each finished turn once
/// formatted; only the formatted copy counts as the end of the turn.
fn parse_message(raw: &str) -> Option<ConnectorEvent> {
    let message: WireMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unparseable transcriber message");
            return None;
        }
    };

    if let Some(error) = message.error {
        return Some(ConnectorEvent::Error(error));
    }
    match message.kind.as_deref() {
        Some("Begin" | "SessionBegins") => {
            return Some(ConnectorEvent::Opened {
                stream_id: message.id,
            })
        }
        Some("Termination" | "SessionTerminated") => return Some(ConnectorEvent::Closed),
        _ => {}
    }

    let text = message.transcript.or(message.text)?;
    let end_of_turn = message
        .end_of_turn
        .map(|eot| eot && message.turn_is_formatted.unwrap_or(true));
    Some(ConnectorEvent::Turn(RawTurn {
        text,
        is_final: None,
        end_of_turn,
        message_type: message.kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_termination() {
        assert_eq!(
            parse_message(r#"{"type":"Begin","id":"abc","expires_at":1}"#),
            Some(ConnectorEvent::Opened {
                stream_id: Some("abc".into())
            })
        );
        assert_eq!(
            parse_message(r#"{"type":"Termination","audio_duration_seconds":3}"#),
            Some(ConnectorEvent::Closed)
        );
    }

    #[test]
    fn unformatted_end_of_turn_stays_partial() {
        let raw = r#"{"type":"Turn","transcript":"whats the weather","end_of_turn":true,"turn_is_formatted":false}"#;
        let Some(ConnectorEvent::Turn(turn)) = parse_message(raw) else {
            panic!("expected a turn");
        };
        assert!(!turn.is_final());

        let raw = r#"{"type":"Turn","transcript":"What's the weather?","end_of_turn":true,"turn_is_formatted":true}"#;
        let Some(ConnectorEvent::Turn(turn)) = parse_message(raw) else {
            panic!("expected a turn");
        };
        assert!(turn.is_final());
        assert_eq!(turn.text, "What's the weather?");
    }

    #[test]
    fn legacy_final_transcript() {
        let raw = r#"{"message_type":"FinalTranscript","text":"hello there"}"#;
        let Some(ConnectorEvent::Turn(turn)) = parse_message(raw) else {
            panic!("expected a turn");
        };
        assert!(turn.is_final());
    }

    #[test]
    fn errors_and_garbage() {
        assert_eq!(
            parse_message(r#"{"error":"Invalid API key"}"#),
            Some(ConnectorEvent::Error("Invalid API key".into()))
        );
        assert_eq!(parse_message("not json"), None);
        assert_eq!(parse_message(r#"{"type":"Unknown"}"#), None);
    }

    #[test]
    fn stream_url_appends_query() {
        let factory = AssemblyAiFactory::new(AsrConfig::default());
        assert_eq!(
            factory.stream_url(16_000),
            "wss://streaming.assemblyai.com/v3/ws?sample_rate=16000&encoding=pcm_s16le&format_turns=true"
        );
    }
}
