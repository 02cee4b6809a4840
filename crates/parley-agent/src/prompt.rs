//! System prompt assembly.

use crate::session::SessionState;
use std::fmt::Write;

/// Builds the system prompt from the session's cached projects, tasks and
/// user notes.
pub fn system_prompt(assistant_name: &str, state: &SessionState) -> String {
    let projects = state
        .projects
        .iter()
        .map(|project| project.name())
        .collect::<Vec<_>>()
        .join(", ");
    let tasks = state
        .tasks
        .iter()
        .map(|task| format!("{} (id {}, project {})", task.content, task.id, task.project_id))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are {assistant_name}, a natural, conversational voice assistant. \
Everything you say is read aloud by a text-to-speech engine.

When speaking:
- Use casual pauses with commas and a friendly tone.
- React with short cues like \"ah\", \"oh\", \"hmm\", \"right\", \"got it\".
- Use contractions like \"I'm\", \"you'll\", \"we're\".
- Vary sentence length for a natural flow.

Rules:
- Always call get_current_time before creating tasks with a due_date or reminder_at, and speak times in the user's local time, not UTC.
- Use the available tools whenever possible before saying something can't be done.
- Never read out raw JSON or mention tool names.
- If you must stop listening, call send_to_standby.
- Keep answers short but warm.

Current projects: {projects}
Current tasks: {tasks}
"
    );

    if !state.user_info.trim().is_empty() {
        let _ = writeln!(prompt, "About the user: {}", state.user_info.trim());
    }
    prompt
}
