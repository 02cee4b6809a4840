use super::{parse_args, Tool, ToolContext, ToolError};
use crate::store::TaskStore;
use async_trait::async_trait;
use parley_db::{CreateTaskParams, UpdateTaskParams};
use parley_types::ToolEnvelope;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn task_properties() -> Value {
    json!({
        "content": {"type": "string", "description": "Short task title"},
        "description": {"type": "string"},
        "priority": {"type": "integer", "description": "1 (normal) to 4 (urgent)"},
        "project_id": {"type": "integer"},
        "due_date": {"type": "string", "description": "ISO-8601 date or datetime in the user's local time"},
        "reminder_at": {"type": "string", "description": "ISO-8601 datetime in the user's local time"}
    })
}

/// Ids arrive as integers or numeric strings depending on the model.
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Text(String),
    }
    match Id::deserialize(deserializer)? {
        Id::Int(id) => Ok(id),
        Id::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskArgs {
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_priority")]
    priority: i64,
    #[serde(default, deserialize_with = "lenient_id")]
    project_id: i64,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    reminder_at: Option<String>,
}

fn default_priority() -> i64 {
    1
}

pub struct CreateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl CreateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a new task in the user's task list. Call get_current_time first so due_date and reminder_at use the user's local time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": task_properties(),
            "required": ["content", "priority", "project_id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolEnvelope, ToolError> {
        let args: CreateTaskArgs = parse_args(self.name(), args)?;
        let session = ctx.session().await?;
        let task = self
            .store
            .create_task(
                session.identity.user_id,
                CreateTaskParams {
                    content: args.content,
                    description: args.description,
                    priority: args.priority,
                    project_id: args.project_id,
                    due_date: args.due_date,
                    reminder_at: args.reminder_at,
                },
            )
            .await?;

        session.state().await.tasks.push(task.clone());
        tracing::info!(session_id = %ctx.session_id, task_id = task.id, "task created");

        Ok(ToolEnvelope::success()
            .with("task_id", task.id)
            .with_task(task))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateTaskArgs {
    #[serde(deserialize_with = "lenient_id")]
    id: i64,
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_completed: bool,
    #[serde(default = "default_priority")]
    priority: i64,
    #[serde(default, deserialize_with = "lenient_id")]
    project_id: i64,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    reminder_at: Option<String>,
}

pub struct UpdateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update an existing task by id, replacing all of its fields. Use get_current_time first when changing due_date or reminder_at."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = task_properties();
        properties["id"] = json!({"type": "integer"});
        properties["is_completed"] = json!({"type": "boolean"});
        json!({
            "type": "object",
            "properties": properties,
            "required": ["id", "content", "is_completed", "priority", "project_id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolEnvelope, ToolError> {
        let args: UpdateTaskArgs = parse_args(self.name(), args)?;
        let session = ctx.session().await?;
        let task = self
            .store
            .update_task(
                session.identity.user_id,
                args.id,
                UpdateTaskParams {
                    content: args.content,
                    description: args.description,
                    is_completed: args.is_completed,
                    priority: args.priority,
                    project_id: args.project_id,
                    due_date: args.due_date,
                    reminder_at: args.reminder_at,
                },
            )
            .await?;

        {
            let mut state = session.state().await;
            match state.tasks.iter_mut().find(|cached| cached.id == task.id) {
                Some(cached) => *cached = task.clone(),
                None => state.tasks.push(task.clone()),
            }
        }

        Ok(ToolEnvelope::success().with_task(task))
    }
}

pub struct GetCurrentTasksTool;

#[async_trait]
impl Tool for GetCurrentTasksTool {
    fn name(&self) -> &str {
        "get_current_tasks"
    }

    fn description(&self) -> &str {
        "Get all current tasks from the user's session."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolEnvelope, ToolError> {
        let session = ctx.session().await?;
        let tasks = serde_json::to_value(&session.state().await.tasks)?;
        Ok(ToolEnvelope::success().with("tasks", tasks))
    }
}
