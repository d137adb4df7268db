//! serverstats gateway library entry.
//!
//! Wires configuration, the counter table, the host snapshot provider and
//! the metrics engine into an axum router. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod ops;
pub mod provider;
pub mod router;
