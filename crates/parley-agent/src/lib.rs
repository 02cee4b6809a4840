//! The conversational core of a Parley voice session.
//!
//! Each accepted turn runs a two-node loop: the **agent** step asks the
//! language model for a reply, and when that reply requests tool calls the
//! **tools** step executes them through the [`ToolRegistry`] and feeds the
//! results back to the agent. The loop ends when the model answers without
//! tool calls, and the whole run is bounded by a wall-clock timeout.
//!
//! Session state lives in the [`SessionRegistry`]. Tools never reach for a
//! global; they receive a [`ToolContext`] naming the session that issued the
//! call.

pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod store;
pub mod tools;
pub mod trimmer;

pub use config::{AgentConfig, ToolsConfig};
pub use llm::{ChatModel, ModelError, ModelReply, OpenAiChatModel};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, TurnOutcome};
pub use session::{Session, SessionRegistry, SessionState};
pub use store::{IpInfoLookup, SqliteTaskStore, StoreError, TaskStore, TimezoneLookup};
pub use tools::{default_tools, Tool, ToolContext, ToolError, ToolRegistry, ToolSpec};
pub use trimmer::trim_history;
