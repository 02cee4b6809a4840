//! Task and project records cached in a voice session.
//!
//! Clients send their current tasks and projects in the connection handshake;
//! tools append to these caches as they create new records.

use serde::{Deserialize, Serialize};

/// A to-do item.
///
/// Deserialization is lenient: clients send whatever subset of fields they
/// hold, and missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: i64,
    pub project_id: i64,
    pub is_completed: bool,
    /// ISO-8601 due date, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// ISO-8601 reminder time, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<String>,
}

/// A project (task folder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default = "default_view_style")]
    pub view_style: String,
}

fn default_color() -> String {
    "charcoal".to_string()
}

fn default_view_style() -> String {
    "list".to_string()
}

/// A project as known to the session: either a bare name (what most clients
/// send in the handshake) or a full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    Name(String),
    Record(ProjectRecord),
}

impl ProjectRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Record(record) => &record.name,
        }
    }
}
