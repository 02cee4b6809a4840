use super::{parse_args, Tool, ToolContext, ToolError};
use crate::store::TaskStore;
use async_trait::async_trait;
use parley_db::CreateProjectParams;
use parley_types::{ProjectRef, ToolEnvelope};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateProjectArgs {
    name: String,
    #[serde(default = "default_color")]
    color: String,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default = "default_view_style")]
    view_style: String,
}

fn default_color() -> String {
    "charcoal".to_string()
}

fn default_view_style() -> String {
    "list".to_string()
}

pub struct CreateProjectTool {
    store: Arc<dyn TaskStore>,
}

impl CreateProjectTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateProjectTool {
    fn name(&self) -> &str {
        "create_project"
    }

    fn description(&self) -> &str {
        "Create a new project folder to organize tasks."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "color": {"type": "string", "description": "Color name, e.g. charcoal, red, blue"},
                "is_favorite": {"type": "boolean"},
                "view_style": {"type": "string", "enum": ["list", "board"]}
            },
            "required": ["name", "color", "is_favorite", "view_style"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolEnvelope, ToolError> {
        let args: CreateProjectArgs = parse_args(self.name(), args)?;
        let session = ctx.session().await?;
        let project = self
            .store
            .create_project(
                session.identity.user_id,
                CreateProjectParams {
                    name: args.name,
                    color: args.color,
                    is_favorite: args.is_favorite,
                    view_style: args.view_style,
                },
            )
            .await?;

        session
            .state()
            .await
            .projects
            .push(ProjectRef::Name(project.name.clone()));

        Ok(ToolEnvelope::success().with("project_id", project.id))
    }
}

pub struct GetCurrentProjectsTool;

#[async_trait]
impl Tool for GetCurrentProjectsTool {
    fn name(&self) -> &str {
        "get_current_projects"
    }

    fn description(&self) -> &str {
        "Return all project names in the current session."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolEnvelope, ToolError> {
        let session = ctx.session().await?;
        let names: Vec<String> = session
            .state()
            .await
            .projects
            .iter()
            .map(|project| project.name().to_string())
            .collect();
        Ok(ToolEnvelope::success().with("projects", names))
    }
}
