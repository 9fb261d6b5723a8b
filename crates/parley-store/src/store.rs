//! Authoritative storage of sessions and their message logs
//!
//! Sessions live in a DashMap keyed by id, with a second DashMap indexing
//! the unordered participant pair so find-or-create is a single atomic step.
//! Different sessions never contend: DashMap shards the id space and each
//! session carries its own lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parley_core::{ChatMessage, Participant, RelayError, Result, SessionKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Normalized key for the unordered pair of participants.
/// `[A, B]` and `[B, A]` map to the same key.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct PairKey {
    lo: (String, bool),
    hi: (String, bool),
}

impl PairKey {
    fn new(a: &Participant, b: &Participant) -> Self {
        let a = (a.name.clone(), a.is_agent);
        let b = (b.name.clone(), b.is_agent);
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }
}

/// One two-party conversation: fixed participants, append-only log,
/// and the unseen flag.
///
/// The flag is only written while the message-log write lock is held, so an
/// append racing a clearing read either lands in the returned snapshot or
/// leaves the flag raised afterwards. It is never silently dropped.
pub struct Session {
    id: SessionKey,
    participants: [Participant; 2],
    messages: RwLock<Vec<ChatMessage>>,
    unseen: AtomicBool,
}

impl Session {
    fn new(id: SessionKey, participants: [Participant; 2]) -> Self {
        Self {
            id,
            participants,
            messages: RwLock::new(Vec::new()),
            unseen: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionKey {
        &self.id
    }

    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }

    /// Current unseen flag, no side effects.
    pub fn unseen(&self) -> bool {
        self.unseen.load(Ordering::SeqCst)
    }

    /// Append a message and raise the unseen flag.
    pub async fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.write().await;
        messages.push(message);
        self.unseen.store(true, Ordering::SeqCst);
    }

    /// Snapshot the full ordered log. A clearing read takes the write lock
    /// so the snapshot and the flag clear commit as one step.
    pub async fn read_history(&self, clear_unseen: bool) -> Vec<ChatMessage> {
        if clear_unseen {
            let messages = self.messages.write().await;
            let snapshot = messages.clone();
            self.unseen.store(false, Ordering::SeqCst);
            snapshot
        } else {
            self.messages.read().await.clone()
        }
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

/// Process-wide session registry. Constructed once and shared by `Arc`.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, Arc<Session>>,
    pairs: DashMap<PairKey, SessionKey>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent find-or-create. The bool is true when a new session was
    /// actually created.
    ///
    /// Resolution order: explicit `requested_id` match, then the unordered
    /// participant pair, then a fresh session (with `requested_id` or a
    /// generated uuid). The pair index is claimed through the DashMap entry
    /// API, so two racing callers cannot create duplicate sessions for the
    /// same pair.
    pub fn create_or_get(
        &self,
        participants: &[Participant],
        requested_id: Option<&str>,
    ) -> Result<(Arc<Session>, bool)> {
        let pair = validate_participants(participants)?;

        if let Some(id) = requested_id {
            if id.trim().is_empty() {
                return Err(RelayError::invalid("session id must not be blank"));
            }
            if let Some(existing) = self.sessions.get(&SessionKey::new(id)) {
                return Ok((existing.clone(), false));
            }
        }

        let key = PairKey::new(pair[0], pair[1]);
        match self.pairs.entry(key) {
            Entry::Occupied(entry) => {
                let id = entry.get().clone();
                let session = self.sessions.get(&id).map(|s| s.clone()).ok_or_else(|| {
                    RelayError::StoreCorruption(format!(
                        "pair index points at missing session {id}"
                    ))
                })?;
                Ok((session, false))
            }
            Entry::Vacant(entry) => {
                let id = requested_id
                    .map(SessionKey::new)
                    .unwrap_or_else(|| SessionKey::new(Uuid::new_v4().to_string()));
                // entry() instead of insert(): an id claimed by a racing
                // caller is returned, never overwritten.
                let mut created = false;
                let session = self
                    .sessions
                    .entry(id.clone())
                    .or_insert_with(|| {
                        created = true;
                        Arc::new(Session::new(id.clone(), [pair[0].clone(), pair[1].clone()]))
                    })
                    .clone();
                entry.insert(id.clone());
                if created {
                    info!("Session {} created ({} / {})", id, pair[0].name, pair[1].name);
                }
                Ok((session, created))
            }
        }
    }

    /// Order-independent lookup by participant pair.
    pub fn find_by_participants(&self, participants: &[Participant]) -> Result<Arc<Session>> {
        let pair = validate_participants(participants)?;
        let key = PairKey::new(pair[0], pair[1]);
        let id = self
            .pairs
            .get(&key)
            .map(|e| e.value().clone())
            .ok_or_else(|| RelayError::not_found("no session for these two participants"))?;
        self.sessions
            .get(&id)
            .map(|s| s.clone())
            .ok_or_else(|| RelayError::StoreCorruption(format!("pair index points at missing session {id}")))
    }

    pub fn get(&self, id: &SessionKey) -> Result<Arc<Session>> {
        self.sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| RelayError::not_found(id.as_str()))
    }

    pub async fn append_message(
        &self,
        id: &SessionKey,
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        let session = self.get(id)?;
        session.append(ChatMessage::new(sender, content)).await;
        Ok(())
    }

    pub fn peek_unseen(&self, id: &SessionKey) -> Result<bool> {
        Ok(self.get(id)?.unseen())
    }

    /// All session ids currently flagged unseen, sorted for deterministic
    /// iteration order.
    pub fn list_unseen_session_ids(&self) -> Vec<SessionKey> {
        let mut ids: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().unseen())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn read_history(
        &self,
        id: &SessionKey,
        clear_unseen: bool,
    ) -> Result<(Vec<Participant>, Vec<ChatMessage>)> {
        let session = self.get(id)?;
        let messages = session.read_history(clear_unseen).await;
        Ok((session.participants().to_vec(), messages))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Exactly two participants with distinct, non-blank names.
fn validate_participants(participants: &[Participant]) -> Result<[&Participant; 2]> {
    let [a, b] = participants else {
        return Err(RelayError::invalid(format!(
            "expected exactly two participants, got {}",
            participants.len()
        )));
    };
    if a.name.trim().is_empty() || b.name.trim().is_empty() {
        return Err(RelayError::invalid("participant names must not be blank"));
    }
    if a.name == b.name {
        return Err(RelayError::invalid(format!(
            "participants must be distinct, got {} twice",
            a.name
        )));
    }
    Ok([a, b])
}
