use super::{Tool, ToolContext, ToolError};
use crate::store::TimezoneLookup;
use async_trait::async_trait;
use parley_types::ToolEnvelope;
use serde_json::{json, Value};
use std::sync::Arc;

/// Current UTC time plus the caller's location details.
///
/// The location is looked up once per session and cached. A failed lookup is
/// reported inside `timezone_info` and retried on the next call.
pub struct GetCurrentTimeTool {
    timezones: Arc<dyn TimezoneLookup>,
}

impl GetCurrentTimeTool {
    pub fn new(timezones: Arc<dyn TimezoneLookup>) -> Self {
        Self { timezones }
    }
}

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current UTC time and the user's local timezone and general location info."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolEnvelope, ToolError> {
        let session = ctx.session().await?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

        let cached = session.state().await.timezone.clone();
        let timezone_info = match cached {
            Some(info) => info,
            None => match self.timezones.lookup(&session.client_ip).await {
                Ok(info) => {
                    session.state().await.timezone = Some(info.clone());
                    info
                }
                Err(e) => {
                    tracing::warn!(session_id = %ctx.session_id, error = %e, "timezone lookup failed");
                    json!({"error": e.to_string()})
                }
            },
        };

        Ok(ToolEnvelope::success()
            .with("current_time", now)
            .with("timezone_info", timezone_info))
    }
}
