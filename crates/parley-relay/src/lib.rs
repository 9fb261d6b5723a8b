//! Parley Relay - the session relay service and its HTTP surface

pub mod server;
pub mod service;

pub use server::{router, serve};
pub use service::RelayService;
