//! Parley Store - concurrency-safe session registry with unseen-flag tracking

pub mod store;

pub use store::{Session, SessionStore};
