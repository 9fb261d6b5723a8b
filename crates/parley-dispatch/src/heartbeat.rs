//! The dispatch loop: chat dispatch then task dispatch, once per interval
//!
//! Iterations never overlap; a tick fully completes before the next sleep.
//! Every failure path is local: a broken collaborator or a bad session is
//! logged and retried next iteration, and the loop itself never dies.

use crate::clients::{AgentInvoker, AgentTurn, Backlog, BacklogItem};
use crate::config::{DispatchConfig, DISPATCH_ACTOR};
use crate::events::EventReporter;
use crate::policy::next_responder;
use parley_core::{Participant, RelayError, Result};
use parley_relay::RelayService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TASK_SESSION_PREFIX: &str = "parley-task-";

/// Stable session id for a backlog item. Same item, same id, across
/// iterations and restarts.
pub fn task_session_id(item_id: &str) -> String {
    format!("{TASK_SESSION_PREFIX}{item_id}")
}

pub struct DispatchLoop {
    relay: Arc<RelayService>,
    agent: Arc<dyn AgentInvoker>,
    backlog: Arc<dyn Backlog>,
    events: EventReporter,
    config: DispatchConfig,
}

impl DispatchLoop {
    pub fn new(
        relay: Arc<RelayService>,
        agent: Arc<dyn AgentInvoker>,
        backlog: Arc<dyn Backlog>,
        events: EventReporter,
        config: DispatchConfig,
    ) -> Self {
        Self {
            relay,
            agent,
            backlog,
            events,
            config,
        }
    }

    /// Run until cancelled. Shutdown is graceful: the in-flight tick
    /// finishes, no new tick starts.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Dispatch loop starting (interval {:?})",
            self.config.interval
        );
        loop {
            self.tick().await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Dispatch loop stopping");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// One full iteration: both phases, each best-effort and independent of
    /// the other's failures.
    pub async fn tick(&self) {
        self.chat_phase().await;
        self.task_phase().await;
    }

    async fn chat_phase(&self) {
        for session_id in self.relay.list_updated_sessions() {
            if let Err(error) = self.process_session(&session_id).await {
                // Unseen flag stays set: the session reappears next tick.
                warn!("Failed to process session {}: {}", session_id, error);
            }
        }
    }

    async fn process_session(&self, session_id: &str) -> Result<()> {
        self.events
            .report(
                "dispatch",
                "dispatch.found_message",
                Some(&format!("Processing new message in session {session_id}")),
            )
            .await;

        // Non-clearing read: the flag must survive if anything below fails.
        let (participants, messages) = self.relay.read_history(session_id, false).await?;
        let participants: [Participant; 2] = participants.try_into().map_err(|_| {
            RelayError::StoreCorruption(format!(
                "session {session_id} does not have two participants"
            ))
        })?;

        let Some(responder) = next_responder(&participants, &messages) else {
            // Nobody to act. Clear the flag anyway or this session would be
            // revisited every tick forever.
            self.relay.read_history(session_id, true).await?;
            return Ok(());
        };
        let responder = responder.name.clone();

        let turns: Vec<AgentTurn> = messages
            .iter()
            .map(|m| {
                if m.sender == responder {
                    AgentTurn::assistant(&m.content)
                } else {
                    AgentTurn::user(&m.content)
                }
            })
            .collect();

        let reply = tokio::time::timeout(
            self.config.invoke_timeout,
            self.agent.invoke(&responder, &turns),
        )
        .await
        .map_err(|_| RelayError::collaborator("agent", "invocation timed out"))??;

        self.relay.send_message(session_id, &responder, &reply).await?;
        // The append above re-raised the flag for the responder's own reply.
        // Clear it so the flag tracks only activity after this point;
        // otherwise a lone agent would keep answering itself every tick.
        self.relay.read_history(session_id, true).await?;
        info!("Session {}: {} replied", session_id, responder);
        Ok(())
    }

    async fn task_phase(&self) {
        let items = match self.backlog.actionable_items().await {
            Ok(items) => items,
            Err(error) => {
                warn!("Failed to list backlog items: {}", error);
                return;
            }
        };
        for item in items {
            if let Err(error) = self.dispatch_item(&item).await {
                warn!("Failed to dispatch task {}: {}", item.id, error);
            }
        }
    }

    async fn dispatch_item(&self, item: &BacklogItem) -> Result<()> {
        let assignee = item.assignee.trim();
        if assignee.is_empty() {
            // Unassigned items wait in the backlog.
            return Ok(());
        }
        let session_id = task_session_id(&item.id);
        let participants = [
            Participant::human(DISPATCH_ACTOR),
            Participant::agent(assignee),
        ];
        self.relay
            .create_or_find_session(&participants, Some(&session_id))?;

        // Non-clearing read: the emptiness check must not swallow an unseen
        // flag that chat dispatch still has to process.
        let (_, messages) = self.relay.read_history(&session_id, false).await?;
        if !messages.is_empty() {
            // Already seeded. This is the guard that keeps repeated polling
            // from re-sending the task prompt.
            return Ok(());
        }

        let body = format!(
            "Task ({}): {}\n\n{}",
            item.status, item.title, item.instructions
        );
        self.relay
            .send_message(&session_id, DISPATCH_ACTOR, &body)
            .await?;
        info!("Dispatched task {} to {}", item.id, assignee);
        self.events
            .report(
                "dispatch",
                "dispatch.found_task",
                Some(&format!("Dispatched task {}: {:?}", item.id, item.title)),
            )
            .await;
        Ok(())
    }
}
