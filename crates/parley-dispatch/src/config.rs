//! Dispatch configuration loaded from environment
//!
//! Base URLs default to Docker-Compose-style service names so the loop works
//! unconfigured inside a compose network.

use std::time::Duration;

/// Sender name used when the dispatch loop seeds a task session. Deliberately
/// a non-agent: the responder policy must always hand the turn to the
/// assignee, never back to the dispatcher.
pub const DISPATCH_ACTOR: &str = "ParleyDispatch";

const DEFAULT_AGENT_URL: &str = "http://agentd:8000";
const DEFAULT_BACKLOG_URL: &str = "http://backlog:8000";
const DEFAULT_INTERVAL_SECS: u64 = 10;
const DEFAULT_INVOKE_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Base URL of the agent-invocation collaborator.
    pub agent_url: String,
    /// Base URL of the ticket backlog collaborator.
    pub backlog_url: String,
    /// Base URL of the observability sink. None disables reporting.
    pub events_url: Option<String>,
    /// Sleep between loop iterations.
    pub interval: Duration,
    /// Upper bound on a single agent invocation.
    pub invoke_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            backlog_url: DEFAULT_BACKLOG_URL.to_string(),
            events_url: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            invoke_timeout: Duration::from_secs(DEFAULT_INVOKE_TIMEOUT_SECS),
        }
    }
}

impl DispatchConfig {
    /// Read `PARLEY_AGENT_URL`, `PARLEY_BACKLOG_URL`, `PARLEY_EVENTS_URL`,
    /// `PARLEY_DISPATCH_INTERVAL_SECS`, and `PARLEY_INVOKE_TIMEOUT_SECS`,
    /// falling back to the defaults above.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            agent_url: env_url("PARLEY_AGENT_URL").unwrap_or(defaults.agent_url),
            backlog_url: env_url("PARLEY_BACKLOG_URL").unwrap_or(defaults.backlog_url),
            events_url: env_url("PARLEY_EVENTS_URL"),
            interval: env_secs("PARLEY_DISPATCH_INTERVAL_SECS").unwrap_or(defaults.interval),
            invoke_timeout: env_secs("PARLEY_INVOKE_TIMEOUT_SECS")
                .unwrap_or(defaults.invoke_timeout),
        }
    }
}

fn env_url(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
