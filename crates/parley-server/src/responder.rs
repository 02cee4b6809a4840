//! Turn lifecycle events towards one client.

use parley_agent::TurnOutcome;
use parley_types::ServerEvent;
use tokio::sync::mpsc;

/// Serializes [`ServerEvent`]s onto the connection's outbound channel.
///
/// Sends after the client has gone away are dropped silently. Every turn
/// ends with exactly one of [`Responder::finish`], [`Responder::end`] or
/// [`Responder::error`].
#[derive(Debug, Clone)]
pub struct Responder {
    tx: mpsc::Sender<String>,
}

impl Responder {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    pub async fn start(&self) {
        self.send(ServerEvent::Start).await;
    }

    pub async fn caption(&self, text: impl Into<String>) {
        self.send(ServerEvent::AsrPartial { text: text.into() }).await;
    }

    /// Emits the response of a completed turn.
    ///
    /// A non-empty response (or one carrying a task or summary) goes out as a
    /// `chunk`; the turn always closes with an empty `end`. Standby is flagged
    /// on both. The spoken text travels only on `chunk`; `end` keeps an
    /// empty `text` field so clients can parse every event the same way.
    pub async fn finish(&self, outcome: &TurnOutcome) {
        let standby = outcome.standby.then_some(true);
        if !outcome.response.is_empty() || outcome.task.is_some() || outcome.summary.is_some() {
            self.send(ServerEvent::Chunk {
                text: outcome.response.clone(),
                standby,
                task: outcome.task.clone(),
                summary: outcome.summary.clone(),
            })
            .await;
        }
        self.send(ServerEvent::End {
            text: String::new(),
            standby,
        })
        .await;
    }

    pub async fn end(&self, text: impl Into<String>) {
        self.send(ServerEvent::end(text)).await;
    }

    pub async fn error(&self, text: impl Into<String>) {
        self.send(ServerEvent::error(text)).await;
    }

    async fn send(&self, event: ServerEvent) {
        if self.tx.is_closed() {
            tracing::debug!(?event, "client gone, dropping event");
            return;
        }
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize server event");
                return;
            }
        };
        if self.tx.send(json).await.is_err() {
            tracing::debug!("client gone, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::TaskRecord;
    use serde_json::Value;

    async fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(json) = rx.try_recv() {
            events.push(serde_json::from_str(&json).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn finish_emits_chunk_then_end() {
        let (tx, mut rx) = mpsc::channel(16);
        let responder = Responder::new(tx);
        responder.start().await;
        responder
            .finish(&TurnOutcome {
                response: "Done!".into(),
                task: Some(TaskRecord {
                    id: 7,
                    content: "call mom".into(),
                    ..TaskRecord::default()
                }),
                ..TurnOutcome::default()
            })
            .await;

        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "start");
        assert_eq!(events[1]["type"], "chunk");
        assert_eq!(events[1]["text"], "Done!");
        assert_eq!(events[1]["task"]["id"], 7);
        assert!(events[1].get("standby").is_none());
        assert_eq!(events[2], serde_json::json!({"type": "end", "text": ""}));
    }

    #[tokio::test]
    async fn empty_outcome_still_ends() {
        let (tx, mut rx) = mpsc::channel(16);
        Responder::new(tx).finish(&TurnOutcome::default()).await;
        let events = drain(&mut rx).await;
        assert_eq!(events, vec![serde_json::json!({"type": "end", "text": ""})]);
    }

    #[tokio::test]
    async fn standby_marks_terminal_event() {
        let (tx, mut rx) = mpsc::channel(16);
        Responder::new(tx)
            .finish(&TurnOutcome {
                response: "Okay, I'll go quiet for now.".into(),
                standby: true,
                ..TurnOutcome::default()
            })
            .await;
        let events = drain(&mut rx).await;
        assert_eq!(events[0]["standby"], true);
        assert_eq!(events[1]["type"], "end");
        assert_eq!(events[1]["standby"], true);
    }

    #[tokio::test]
    async fn sends_after_disconnect_are_noops() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let responder = Responder::new(tx);
        responder.start().await;
        responder.error("too late").await;
    }
}
