//! Tools the assistant can call, and the registry that dispatches them.

mod projects;
mod reports;
mod standby;
mod tasks;
mod time;
mod traits;
mod weather;

pub use projects::{CreateProjectTool, GetCurrentProjectsTool};
pub use reports::GetEmailReportTool;
pub use standby::SendToStandbyTool;
pub use tasks::{CreateTaskTool, GetCurrentTasksTool, UpdateTaskTool};
pub use time::GetCurrentTimeTool;
pub use traits::{Tool, ToolSpec};
pub use weather::GetWeatherTool;

use crate::config::ToolsConfig;
use crate::session::{Session, SessionRegistry};
use crate::store::{IpInfoLookup, StoreError, TaskStore};
use futures_util::FutureExt;
use parley_types::{SessionId, ToolEnvelope};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid tool registry: {0}")]
    InvalidRegistry(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("session {0} is no longer active")]
    SessionGone(SessionId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What a tool knows about the call it is serving.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: SessionId,
    sessions: SessionRegistry,
}

impl ToolContext {
    pub fn new(session_id: SessionId, sessions: SessionRegistry) -> Self {
        Self {
            session_id,
            sessions,
        }
    }

    /// The session that issued this call.
    pub async fn session(&self) -> Result<Arc<Session>, ToolError> {
        self.sessions
            .get(self.session_id)
            .await
            .ok_or(ToolError::SessionGone(self.session_id))
    }
}

/// Decodes tool arguments; a missing argument object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Name-indexed tool set, validated once at startup.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    /// Builds a registry. Empty or duplicate names are rejected.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ToolError> {
        let mut map = HashMap::with_capacity(tools.len());
        let mut order = Vec::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name().to_string();
            if name.trim().is_empty() {
                return Err(ToolError::InvalidRegistry("tool with empty name".into()));
            }
            if map.contains_key(&name) {
                return Err(ToolError::InvalidRegistry(format!(
                    "duplicate tool name '{name}'"
                )));
            }
            order.push(name.clone());
            map.insert(name, tool);
        }
        Ok(Self { tools: map, order })
    }

    /// Specs in registration order.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Runs a tool by name.
    ///
    /// Only an unknown name is an `Err`. Failures inside the tool, panics
    /// included, come back as an error envelope.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: Value,
    ) -> Result<ToolEnvelope, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match AssertUnwindSafe(tool.execute(ctx, args)).catch_unwind().await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %ctx.session_id, tool = name, error = %e, "tool failed");
                Ok(ToolEnvelope::error(e.to_string()))
            }
            Err(_) => {
                tracing::error!(session_id = %ctx.session_id, tool = name, "tool panicked");
                Ok(ToolEnvelope::error(format!("{name} crashed")))
            }
        }
    }
}

/// The built-in tool catalogue.
pub fn default_tools(
    config: &ToolsConfig,
    store: Arc<dyn TaskStore>,
) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let timezones = Arc::new(IpInfoLookup::new(&config.ipinfo_base_url, timeout)?);
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SendToStandbyTool),
        Arc::new(GetWeatherTool::new(&config.weather_base_url, timeout)?),
        Arc::new(CreateTaskTool::new(Arc::clone(&store))),
        Arc::new(UpdateTaskTool::new(Arc::clone(&store))),
        Arc::new(CreateProjectTool::new(store)),
        Arc::new(GetCurrentTasksTool),
        Arc::new(GetCurrentProjectsTool),
        Arc::new(GetCurrentTimeTool::new(timezones)),
        Arc::new(GetEmailReportTool),
    ];
    Ok(tools)
}
