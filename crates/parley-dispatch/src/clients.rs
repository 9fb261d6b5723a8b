//! Collaborator seams and their HTTP implementations
//!
//! The dispatch loop only ever sees the traits, so tests substitute stubs
//! and the loop's correctness does not depend on any transport.

use async_trait::async_trait;
use parley_core::{RelayError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const BACKLOG_TIMEOUT: Duration = Duration::from_secs(60);

/// Statuses in which a backlog item needs a turn from its assignee.
const ACTIONABLE_STATUSES: [&str; 2] = ["todo", "review"];

/// One turn handed to the agent collaborator. `assistant` when the responder
/// itself sent it, `user` otherwise.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentTurn {
    pub role: String,
    pub content: String,
}

impl AgentTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One external unit of work awaiting a dedicated session.
#[derive(Clone, Debug, Deserialize)]
pub struct BacklogItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub status: String,
}

/// Generates the next reply for a named agent given conversation turns.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &str, turns: &[AgentTurn]) -> Result<String>;
}

/// Lists backlog items in an actionable state.
#[async_trait]
pub trait Backlog: Send + Sync {
    async fn actionable_items(&self) -> Result<Vec<BacklogItem>>;
}

pub struct HttpAgentClient {
    client: Client,
    base_url: String,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    agent: &'a str,
    messages: &'a [AgentTurn],
}

#[derive(Deserialize)]
struct InvokeResponse {
    content: String,
}

#[async_trait]
impl AgentInvoker for HttpAgentClient {
    async fn invoke(&self, agent: &str, turns: &[AgentTurn]) -> Result<String> {
        debug!("Invoking agent {} with {} turns", agent, turns.len());
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&InvokeRequest {
                agent,
                messages: turns,
            })
            .send()
            .await
            .map_err(|e| RelayError::collaborator("agent", e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::collaborator(
                "agent",
                format!("{status}: {detail}"),
            ));
        }
        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| RelayError::collaborator("agent", e.to_string()))?;
        Ok(body.content)
    }
}

pub struct HttpBacklogClient {
    client: Client,
    base_url: String,
}

impl HttpBacklogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn items_by_status(&self, status: &str) -> Result<Vec<BacklogItem>> {
        let response = self
            .client
            .get(format!("{}/api/tickets", self.base_url))
            .query(&[("status", status)])
            .timeout(BACKLOG_TIMEOUT)
            .send()
            .await
            .map_err(|e| RelayError::collaborator("backlog", e.to_string()))?;
        let status_code = response.status();
        if !status_code.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::collaborator(
                "backlog",
                format!("{status_code}: {detail}"),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| RelayError::collaborator("backlog", e.to_string()))
    }
}

#[async_trait]
impl Backlog for HttpBacklogClient {
    async fn actionable_items(&self) -> Result<Vec<BacklogItem>> {
        let mut items = Vec::new();
        for status in ACTIONABLE_STATUSES {
            items.extend(self.items_by_status(status).await?);
        }
        Ok(items)
    }
}
