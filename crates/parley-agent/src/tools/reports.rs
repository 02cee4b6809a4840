use super::{parse_args, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use parley_types::ToolEnvelope;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ReportArgs {
    day: String,
}

/// Email reports cached from the handshake, filtered by day.
pub struct GetEmailReportTool;

#[async_trait]
impl Tool for GetEmailReportTool {
    fn name(&self) -> &str {
        "get_email_report"
    }

    fn description(&self) -> &str {
        "Fetch the email reports for the given date."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "day": {"type": "string", "description": "Date as YYYY-MM-DD"}
            },
            "required": ["day"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolEnvelope, ToolError> {
        let args: ReportArgs = parse_args(self.name(), args)?;
        let session = ctx.session().await?;
        let reports: Vec<Value> = session
            .state()
            .await
            .reports
            .iter()
            .filter(|report| report.get("day").and_then(Value::as_str) == Some(args.day.as_str()))
            .cloned()
            .collect();

        let summary = reports
            .iter()
            .filter_map(|report| report.get("summary").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        let envelope = ToolEnvelope::success().with("reports", reports);
        Ok(if summary.is_empty() {
            envelope
        } else {
            envelope.with_summary(summary)
        })
    }
}
