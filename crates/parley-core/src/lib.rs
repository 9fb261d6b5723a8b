//! Parley Core - Types, wire protocol, and error handling

pub mod error;
pub mod protocol;
pub mod types;

pub use error::{RelayError, Result};
pub use protocol::*;
pub use types::*;
