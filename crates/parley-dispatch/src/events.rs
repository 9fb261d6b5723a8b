//! Fire-and-forget event reporting to an optional observability sink
//!
//! Never raises: a dead sink must not slow down or fail the dispatch loop
//! beyond the short request timeout.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const REPORT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct EventPayload<'a> {
    source: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

pub struct EventReporter {
    client: Client,
    base_url: Option<String>,
}

impl EventReporter {
    /// `None` or a blank URL disables reporting entirely.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// POST an event to the sink. No-op when disabled; failures are logged
    /// at debug and swallowed.
    pub async fn report(&self, source: &str, event: &str, message: Option<&str>) {
        let Some(base_url) = &self.base_url else {
            return;
        };
        let payload = EventPayload {
            source,
            event,
            message,
        };
        let result = self
            .client
            .post(format!("{base_url}/api/events"))
            .json(&payload)
            .timeout(REPORT_TIMEOUT)
            .send()
            .await;
        if let Err(error) = result {
            debug!("Failed to report event {}: {}", event, error);
        }
    }
}
