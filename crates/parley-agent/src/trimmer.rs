//! Bounds conversation history between turns.

use parley_types::Message;

/// Drops system messages and keeps roughly the last `limit` messages.
///
/// The cut never separates tool results from the assistant message that
/// requested them: if it lands on a tool result it moves back to that
/// assistant message, which can keep a few more than `limit` messages. Tool
/// results left orphaned at the head are dropped.
pub fn trim_history(messages: Vec<Message>, limit: usize) -> Vec<Message> {
    let mut messages: Vec<Message> = messages.into_iter().filter(|m| !m.is_system()).collect();

    if messages.len() > limit {
        let mut start = messages.len() - limit;
        while start > 0 && messages[start].is_tool_result() {
            start -= 1;
        }
        messages.drain(..start);
    }

    let orphans = messages.iter().take_while(|m| m.is_tool_result()).count();
    messages.drain(..orphans);
    messages
}
