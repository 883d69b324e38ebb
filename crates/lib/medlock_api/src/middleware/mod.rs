//! Request middleware: authentication, then rate limiting.

pub mod auth;
pub mod rate_limit;
