//! Per-conversation state: active agent, trip context, and history.
//!
//! A session is a single-owner, single-writer resource: the store hands out
//! `Arc<Mutex<Session>>` and the runtime holds the lock for the whole turn,
//! so one turn per session runs to completion before the next inbound
//! message is processed. Distinct sessions are fully independent.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use skydesk_core::{ReservationBackend, TripContext};

/// One entry of a conversation transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryItem {
    User { text: String },
    Assistant { agent: String, text: String },
    ToolCall { tool: String, arguments: Value },
    ToolResult { tool: String, output: String },
    Handoff { from: String, to: String },
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    /// Name of the agent currently handling this conversation. Starts at the
    /// graph root and moves only via validated handoff decisions.
    pub active_agent: String,
    pub context: TripContext,
    pub history: Vec<HistoryItem>,
}

impl Session {
    pub fn new(id: impl Into<String>, root_agent: impl Into<String>, context: TripContext) -> Self {
        Self {
            id: id.into(),
            active_agent: root_agent.into(),
            context,
            history: Vec::new(),
        }
    }
}

/// In-memory store of live sessions, keyed by caller-supplied ids.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    root_agent: String,
    reservations: Arc<dyn ReservationBackend>,
}

impl SessionStore {
    pub fn new(root_agent: impl Into<String>, reservations: Arc<dyn ReservationBackend>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            root_agent: root_agent.into(),
            reservations,
        }
    }

    /// Fetch an existing session or create one seeded from the reservation
    /// backend, with the root agent active.
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock; another task may have won the race.
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        let session = Session::new(id, self.root_agent.clone(), self.reservations.seed_context());
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id.to_string(), Arc::clone(&handle));
        info!(session_id = %id, root_agent = %self.root_agent, "created session");
        handle
    }

    /// Drop a session entirely; the next message starts fresh at the root.
    pub async fn reset(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skydesk_core::DemoReservations;

    use super::SessionStore;

    #[tokio::test]
    async fn get_or_create_returns_the_same_session_for_a_key() {
        let store = SessionStore::new("triage", Arc::new(DemoReservations));
        let first = store.get_or_create("caller-1").await;
        let second = store.get_or_create("caller-1").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_start_on_the_root_agent() {
        let store = SessionStore::new("triage", Arc::new(DemoReservations));
        let session = store.get_or_create("caller-2").await;
        let session = session.lock().await;
        assert_eq!(session.active_agent, "triage");
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn reset_removes_the_session() {
        let store = SessionStore::new("triage", Arc::new(DemoReservations));
        store.get_or_create("caller-3").await;
        assert!(store.reset("caller-3").await);
        assert!(!store.reset("caller-3").await);
        assert!(store.is_empty().await);
    }

}
