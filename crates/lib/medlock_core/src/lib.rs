//! # medlock_core
//!
//! Core domain logic for the Medlock gateway.
//!
//! Everything here is transport-agnostic: the HTTP layer in `medlock_api`
//! wires these pieces into axum middleware and handlers.

pub mod audit;
pub mod auth;
pub mod kv;
pub mod migrate;
pub mod models;
pub mod ratelimit;
pub mod routing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
