use super::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use parley_types::ToolEnvelope;
use serde_json::{json, Value};

pub struct SendToStandbyTool;

#[async_trait]
impl Tool for SendToStandbyTool {
    fn name(&self) -> &str {
        "send_to_standby"
    }

    fn description(&self) -> &str {
        "Put the assistant into standby so it stops listening until the wake word is heard again."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolEnvelope, ToolError> {
        tracing::info!(session_id = %ctx.session_id, "standby requested");
        Ok(ToolEnvelope::success()
            .spoken("Okay, I'll go quiet for now.")
            .into_standby())
    }
}
