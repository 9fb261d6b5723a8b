//! RelayService: the stable operation set over the session store
//!
//! Holds no state of its own. Validates request shape, normalizes nothing
//! the store does not already normalize (participant order never matters),
//! and maps straight onto store operations.

use parley_core::{ChatMessage, Participant, RelayError, Result, SessionKey};
use parley_store::SessionStore;
use std::sync::Arc;

pub struct RelayService {
    store: Arc<SessionStore>,
}

impl RelayService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Find-or-create. Returns the session id and whether it was created.
    pub fn create_or_find_session(
        &self,
        participants: &[Participant],
        session_id: Option<&str>,
    ) -> Result<(String, bool)> {
        let (session, created) = self.store.create_or_get(participants, session_id)?;
        Ok((session.id().as_str().to_string(), created))
    }

    /// Order-independent lookup; `SessionNotFound` when no session exists
    /// for the pair.
    pub fn find_session(&self, participants: &[Participant]) -> Result<String> {
        let session = self.store.find_by_participants(participants)?;
        Ok(session.id().as_str().to_string())
    }

    pub async fn send_message(&self, session_id: &str, user: &str, message: &str) -> Result<()> {
        let id = checked_id(session_id)?;
        if user.trim().is_empty() {
            return Err(RelayError::invalid("sender must not be blank"));
        }
        self.store.append_message(&id, user, message).await
    }

    /// Read-only unseen check.
    pub fn poll(&self, session_id: &str) -> Result<bool> {
        let id = checked_id(session_id)?;
        self.store.peek_unseen(&id)
    }

    pub fn list_updated_sessions(&self) -> Vec<String> {
        self.store
            .list_unseen_session_ids()
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    pub async fn read_history(
        &self,
        session_id: &str,
        clear_unseen: bool,
    ) -> Result<(Vec<Participant>, Vec<ChatMessage>)> {
        let id = checked_id(session_id)?;
        let (participants, messages) = self.store.read_history(&id, clear_unseen).await?;
        if participants.len() != 2 {
            return Err(RelayError::StoreCorruption(format!(
                "session {} has {} participants",
                session_id,
                participants.len()
            )));
        }
        Ok((participants, messages))
    }
}

fn checked_id(session_id: &str) -> Result<SessionKey> {
    if session_id.trim().is_empty() {
        return Err(RelayError::invalid("session id must not be blank"));
    }
    Ok(SessionKey::new(session_id))
}
