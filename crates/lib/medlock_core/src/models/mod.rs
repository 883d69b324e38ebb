//! Domain models shared across `medlock_api` and `medlock_mcp`.

pub mod audit;
pub mod auth;
