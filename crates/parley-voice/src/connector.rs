//! The seam between a session and its streaming speech recognizer.

use crate::error::VoiceError;
use async_trait::async_trait;
use parley_types::{SessionId, TurnEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An open recognizer stream for one session.
#[async_trait]
pub trait TurnConnector: Send + Sync {
    /// Sends one audio frame.
    async fn stream(&self, frame: Vec<u8>) -> Result<(), VoiceError>;

    /// Ends the stream. Calling it more than once is harmless.
    async fn disconnect(&self) -> Result<(), VoiceError>;
}

/// Opens recognizer streams. Events from the stream are delivered on the
/// channel passed to [`ConnectorFactory::connect`], never through callbacks.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn connect(
        &self,
        params: &StreamParams,
        events: mpsc::Sender<ConnectorEvent>,
    ) -> Result<Arc<dyn TurnConnector>, VoiceError>;
}

#[derive(Debug, Clone)]
pub struct StreamParams {
    pub session_id: SessionId,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Opened { stream_id: Option<String> },
    Turn(RawTurn),
    Error(String),
    Closed,
}

/// A recognizer result before finality has been decided.
///
/// Recognizers disagree on how they flag a finished turn, so every signal
/// they might send is kept and [`RawTurn::is_final`] accepts any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTurn {
    pub text: String,
    pub is_final: Option<bool>,
    pub end_of_turn: Option<bool>,
    pub message_type: Option<String>,
}

impl RawTurn {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: Some(false),
            ..Self::default()
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: Some(true),
            ..Self::default()
        }
    }

    pub fn is_final(&self) -> bool {
        self.is_final == Some(true)
            || self.end_of_turn == Some(true)
            || self.message_type.as_deref().is_some_and(is_final_type)
    }

    pub fn into_event(self) -> TurnEvent {
        let is_final = self.is_final();
        TurnEvent {
            text: self.text,
            is_final,
        }
    }
}

/// Matches `FinalTranscript`, `final_transcript` and enum-style names such as
/// `RealtimeMessageTypes.final_transcript`.
fn is_final_type(kind: &str) -> bool {
    let name = kind.rsplit('.').next().unwrap_or(kind);
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    normalized == "finaltranscript"
}
