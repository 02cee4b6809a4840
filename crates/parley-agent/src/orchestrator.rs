//! The per-turn agent/tools loop.

use crate::llm::ChatModel;
use crate::prompt::system_prompt;
use crate::session::{Session, SessionRegistry};
use crate::tools::{ToolContext, ToolError, ToolRegistry};
use crate::trimmer::trim_history;
use parley_types::{Message, TaskRecord, ToolCall, ToolEnvelope};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub turn_timeout: Duration,
    pub history_limit: usize,
    /// Upper bound on tool steps in one turn.
    pub max_tool_rounds: usize,
    pub assistant_name: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            history_limit: 12,
            max_tool_rounds: 6,
            assistant_name: "Jarvis".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("turn timed out after {0:?}")]
    Timeout(Duration),
}

/// What a finished turn hands to the responder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Text to speak; may be empty.
    pub response: String,
    pub standby: bool,
    pub task: Option<TaskRecord>,
    pub summary: Option<String>,
}

impl TurnOutcome {
    fn absorb_tool_result(&mut self, call: &ToolCall, envelope: &ToolEnvelope) {
        self.response = match &envelope.spoken_response {
            Some(spoken) => spoken.clone(),
            None if envelope.is_error() => format!("Error using {}", call.name),
            None => envelope.status.as_str().to_string(),
        };
        self.standby |= envelope.standby;
        if envelope.task.is_some() {
            self.task.clone_from(&envelope.task);
        }
        if envelope.summary.is_some() {
            self.summary.clone_from(&envelope.summary);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Agent,
    Tools,
    Terminal,
}

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    sessions: SessionRegistry,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        sessions: SessionRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            tools,
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one turn for `transcript`.
    ///
    /// Session history is replaced with the trimmed result only when the turn
    /// completes. On timeout the work in progress is dropped and history is
    /// left as it was; tool side effects that already happened are kept.
    pub async fn run_turn(
        &self,
        session: &Arc<Session>,
        transcript: &str,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let timeout = self.config.turn_timeout;
        match tokio::time::timeout(timeout, self.run_graph(session, transcript)).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                warn!(session_id = %session.id, ?timeout, "turn timed out");
                Err(OrchestratorError::Timeout(timeout))
            }
        }
    }

    async fn run_graph(&self, session: &Arc<Session>, transcript: &str) -> TurnOutcome {
        let (mut messages, system) = {
            let state = session.state().await;
            (
                state.history.clone(),
                system_prompt(&self.config.assistant_name, &state),
            )
        };
        let ctx = ToolContext::new(session.id, self.sessions.clone());
        let mut outcome = TurnOutcome::default();
        let mut user_appended = false;
        let mut tool_rounds = 0;
        let mut node = Node::Agent;

        while node != Node::Terminal {
            node = match node {
                Node::Agent => {
                    let offer_tools = tool_rounds < self.config.max_tool_rounds;
                    self.agent_step(
                        &mut messages,
                        &system,
                        transcript,
                        offer_tools,
                        &mut user_appended,
                        &mut outcome,
                    )
                    .await
                }
                Node::Tools => {
                    self.tools_step(&ctx, &mut messages, &mut outcome).await;
                    tool_rounds += 1;
                    if tool_rounds >= self.config.max_tool_rounds {
                        warn!(session_id = %session.id, tool_rounds, "tool round limit reached, asking for a final answer");
                    }
                    Node::Agent
                }
                Node::Terminal => Node::Terminal,
            };
        }

        let history = trim_history(messages, self.config.history_limit);
        session.state().await.history = history;
        info!(session_id = %session.id, tool_rounds, standby = outcome.standby, "turn complete");
        outcome
    }

    async fn agent_step(
        &self,
        messages: &mut Vec<Message>,
        system: &str,
        transcript: &str,
        offer_tools: bool,
        user_appended: &mut bool,
        outcome: &mut TurnOutcome,
    ) -> Node {
        if !messages.first().is_some_and(Message::is_system) {
            messages.retain(|m| !m.is_system());
            messages.insert(0, Message::system(system));
        }

        // Re-entries after a tools step already carry the transcript.
        if !*user_appended {
            let repeated = matches!(
                messages.last(),
                Some(Message::User { content }) if content == transcript
            );
            if !repeated && !transcript.is_empty() {
                messages.push(Message::user(transcript));
            }
            *user_appended = true;
        }

        // With tools withheld this step is the last one, so any calls the
        // model still makes are dropped to keep history closed on an answer.
        let tools = if offer_tools { self.tools.list() } else { Vec::new() };
        match self.model.chat(messages, &tools).await {
            Ok(mut reply) => {
                if !offer_tools && !reply.tool_calls.is_empty() {
                    debug!(dropped = reply.tool_calls.len(), "ignoring tool calls after round limit");
                    reply.tool_calls.clear();
                }
                let next = if reply.tool_calls.is_empty() {
                    Node::Terminal
                } else {
                    Node::Tools
                };
                outcome.response.clone_from(&reply.content);
                messages.push(Message::assistant(reply.content, reply.tool_calls));
                next
            }
            Err(e) => {
                warn!(error = %e, "model call failed");
                outcome.response = format!("Oops, something broke: {e}");
                Node::Terminal
            }
        }
    }

    async fn tools_step(
        &self,
        ctx: &ToolContext,
        messages: &mut Vec<Message>,
        outcome: &mut TurnOutcome,
    ) {
        let calls: Vec<ToolCall> = messages
            .last()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        for call in &calls {
            debug!(session_id = %ctx.session_id, tool = %call.name, call_id = %call.id, "invoking tool");
            let envelope = match self.tools.invoke(ctx, &call.name, call.arguments.clone()).await {
                Ok(envelope) => envelope,
                Err(ToolError::NotFound(name)) => {
                    warn!(session_id = %ctx.session_id, tool = %name, "model requested unknown tool");
                    outcome.response = format!("No tool for {name}");
                    messages.push(Message::tool_result(call, &ToolEnvelope::error("tool not found")));
                    continue;
                }
                Err(e) => ToolEnvelope::error(e.to_string()),
            };
            outcome.absorb_tool_result(call, &envelope);
            messages.push(Message::tool_result(call, &envelope));
        }
    }
}
