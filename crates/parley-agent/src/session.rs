//! Per-connection session state and the registry that owns it.

use parley_types::{Handshake, Identity, Message, ProjectRef, SessionId, TaskRecord};
use parley_voice::{TurnGate, TurnState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Mutable state of one session. Lock it briefly; never hold the guard
/// across a model or tool call.
#[derive(Debug, Default)]
pub struct SessionState {
    pub tasks: Vec<TaskRecord>,
    pub projects: Vec<ProjectRef>,
    pub reports: Vec<Value>,
    /// Free-form notes about the user from the user-info store.
    pub user_info: String,
    pub history: Vec<Message>,
    pub turn: TurnState,
    /// Resolved on first use from the client address.
    pub timezone: Option<Value>,
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub identity: Identity,
    pub client_ip: String,
    pub gate: TurnGate,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        identity: Identity,
        client_ip: impl Into<String>,
        handshake: Handshake,
        user_info: String,
    ) -> Self {
        Self {
            id: SessionId::new_v4(),
            identity,
            client_ip: client_ip.into(),
            gate: TurnGate::new(),
            state: Mutex::new(SessionState {
                tasks: handshake.tasks,
                projects: handshake.projects,
                reports: handshake.reports,
                user_info,
                ..SessionState::default()
            }),
        }
    }

    pub async fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

/// All live sessions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        tracing::debug!(session_id = %session.id, "session registered");
        session
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Removes a session. Returns `false` if it was already gone.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: 1,
            email: "ada@example.com".into(),
        }
    }

    #[tokio::test]
    async fn session_is_seeded_from_handshake() {
        let handshake = Handshake {
            projects: vec![ProjectRef::Name("Inbox".into())],
            tasks: vec![TaskRecord {
                id: 4,
                content: "Buy milk".into(),
                ..TaskRecord::default()
            }],
            reports: vec![serde_json::json!({"day": "2024-05-01"})],
        };
        let session = Session::new(identity(), "203.0.113.9", handshake, "Likes jazz".into());
        let state = session.state().await;
        assert_eq!(state.projects[0].name(), "Inbox");
        assert_eq!(state.tasks[0].content, "Buy milk");
        assert_eq!(state.reports.len(), 1);
        assert_eq!(state.user_info, "Likes jazz");
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn remove_happens_once() {
        let registry = SessionRegistry::new();
        let session = registry
            .insert(Session::new(identity(), "127.0.0.1", Handshake::default(), String::new()))
            .await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.ids().await, vec![session.id]);
        assert!(registry.get(session.id).await.is_some());

        assert!(registry.remove(session.id).await);
        assert!(!registry.remove(session.id).await);
        assert!(registry.is_empty().await);
        assert!(registry.get(session.id).await.is_none());
    }
}
