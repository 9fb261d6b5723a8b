//! Core types for Parley

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One participant in a session. Fixed for the session's lifetime.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Participant {
    pub name: String,
    #[serde(rename = "isAgent")]
    pub is_agent: bool,
}

impl Participant {
    pub fn new(name: impl Into<String>, is_agent: bool) -> Self {
        Self {
            name: name.into(),
            is_agent,
        }
    }

    pub fn human(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }
}

/// A message in a session's log. Append-only, never mutated.
///
/// Wire names (`user`, `message`) match the relay HTTP API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(rename = "user")]
    pub sender: String,
    #[serde(rename = "message")]
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}
