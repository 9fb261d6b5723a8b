//! Parley Dispatch - the heartbeat that turns "state changed" into work
//!
//! Once per interval: pick a responder for every session with unseen
//! activity, and seed a dedicated session for every actionable backlog item
//! exactly once.

pub mod clients;
pub mod config;
pub mod events;
pub mod heartbeat;
pub mod policy;

pub use clients::{AgentInvoker, AgentTurn, Backlog, BacklogItem, HttpAgentClient, HttpBacklogClient};
pub use config::{DispatchConfig, DISPATCH_ACTOR};
pub use events::EventReporter;
pub use heartbeat::{task_session_id, DispatchLoop};
pub use policy::next_responder;
