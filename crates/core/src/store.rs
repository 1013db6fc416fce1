use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::session::{Session, SessionId};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
    #[error("stored session `{session_id}` is corrupt: {reason}")]
    Corrupt { session_id: String, reason: String },
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Persists sessions keyed by id. `save` replaces the stored snapshot; turn
/// history only ever grows.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
    /// Removes sessions not updated since `cutoff`, returning how many were dropped.
    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryConversationStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("in-memory session map lock poisoned".to_string())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.lock().map_err(|_| Self::poisoned())?;
        Ok(sessions.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().map_err(|_| Self::poisoned())?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().map_err(|_| Self::poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, session| session.updated_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::session::{Session, SessionId};

    use super::{ConversationStore, InMemoryConversationStore};

    #[tokio::test]
    async fn saved_session_loads_back_unchanged() {
        let store = InMemoryConversationStore::new();
        let mut session = Session::new(SessionId("s-1".to_string()));
        session.record_user_turn("Should we raise a Series A or bootstrap?");

        store.save(&session).await.expect("save");
        let loaded = store.load(&session.id).await.expect("load").expect("session exists");

        assert_eq!(loaded, session);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let store = InMemoryConversationStore::new();
        assert!(store.load(&SessionId("missing".to_string())).await.expect("load").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn prune_idle_drops_only_stale_sessions() {
        let store = InMemoryConversationStore::new();
        let mut stale = Session::new(SessionId("stale".to_string()));
        stale.updated_at = Utc::now() - Duration::hours(48);
        let fresh = Session::new(SessionId("fresh".to_string()));
        store.save(&stale).await.expect("save stale");
        store.save(&fresh).await.expect("save fresh");

        let removed = store.prune_idle(Utc::now() - Duration::hours(24)).await.expect("prune");

        assert_eq!(removed, 1);
        assert!(store.load(&stale.id).await.expect("load").is_none());
        assert!(store.load(&fresh.id).await.expect("load").is_some());
    }
}
