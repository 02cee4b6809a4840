//! Client wire protocol for the voice WebSocket.
//!
//! The client opens with a single JSON [`Handshake`] text frame and then
//! streams binary PCM. The server answers with JSON [`ServerEvent`] frames:
//!
//! ```text
//! start → asr_partial* / chunk* → end | error
//! ```

use crate::task::{ProjectRef, TaskRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The first frame a client sends after the socket opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    /// Daily email reports. Older clients send these as `summaries`.
    #[serde(default, alias = "summaries")]
    pub reports: Vec<Value>,
}

/// Lifecycle events streamed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A turn was accepted and is being processed.
    Start,
    /// Live caption of the speech recognized so far.
    AsrPartial { text: String },
    /// Spoken response text for the turn.
    Chunk {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        standby: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<TaskRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// Terminal event of a successful (or short-circuited) turn.
    End {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        standby: Option<bool>,
    },
    /// Terminal event of a failed turn.
    Error { text: String },
}

impl ServerEvent {
    pub fn end(text: impl Into<String>) -> Self {
        Self::End {
            text: text.into(),
            standby: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    /// Whether this event closes a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error { .. })
    }
}
