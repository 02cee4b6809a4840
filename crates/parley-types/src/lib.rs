//! Shared types for the Parley voice-session platform.
//!
//! This crate provides the foundational types used across all Parley crates:
//! the conversation [`Message`] model, the tool result envelope, turn events
//! produced by speech recognition, the client wire protocol, and the
//! task/project records cached per session.
//!
//! No crate in the workspace depends on anything *except* `parley-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use serde::{Deserialize, Serialize};

mod event;
mod message;
mod task;

pub use event::{Handshake, ServerEvent};
pub use message::{Message, ToolCall, ToolEnvelope, ToolStatus};
pub use task::{ProjectRecord, ProjectRef, TaskRecord};

/// Unique identifier for a live voice session.
pub type SessionId = uuid::Uuid;

/// The authenticated user behind a connection.
///
/// Resolved once from the connection token and never re-checked for the
/// lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Database id of the user.
    pub user_id: i64,
    /// Email address (the token subject).
    pub email: String,
}

/// A speech-recognition turn signal.
///
/// Partial events carry ephemeral text that may still change; only final
/// events are durable triggers for an orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEvent {
    pub text: String,
    pub is_final: bool,
}

impl TurnEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}
