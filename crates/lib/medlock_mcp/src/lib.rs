//! # medlock_mcp
//!
//! MCP (Model Context Protocol) server for Medlock.
//!
//! Provides a stateful Streamable HTTP MCP server with two vitals tools and
//! a session-info resource. It performs no
//! authentication of its own: the gateway in `medlock_api` authenticates,
//! rate-limits and pins sessions, then hands requests over with the caller's
//! [`Identity`](medlock_core::models::auth::Identity) in the request extensions.

pub mod server;
pub mod tools;

use std::sync::Arc;

use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use medlock_core::audit::AuditLog;

/// Path the MCP endpoint is served on.
pub const MCP_PATH: &str = "/api/mcp";

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build an Axum router that serves the MCP Streamable HTTP endpoint at
/// [`MCP_PATH`].
///
/// # Arguments
///
/// * `audit`: audit log receiving a `tool_execution` entry per tool call.
/// * `base_url`: public base URL used in scan links.
/// * `ct`: cancellation token for graceful shutdown of SSE streams.
pub fn mcp_router(audit: AuditLog, base_url: String, ct: CancellationToken) -> axum::Router {
    let service: StreamableHttpService<server::MedlockMcpServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || {
                Ok(server::MedlockMcpServer::new(
                    audit.clone(),
                    base_url.clone(),
                ))
            },
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                stateful_mode: true,
                cancellation_token: ct,
                ..Default::default()
            },
        );

    axum::Router::new().nest_service(MCP_PATH, service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
