//! MCP server handler: the Medlock vitals server, its tools and the
//! session-info resource.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rmcp::{
    RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Extension, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use medlock_core::audit::AuditLog;
use medlock_core::models::auth::{Identity, USER_ID_HEADER, USERNAME_HEADER};

use crate::tools::vitals::{self, SessionInfo, VitalsScanRequest};

/// Audit action recorded for each vitals tool call.
pub const TOOL_EXECUTION: &str = "tool_execution";

/// URI of the session-info resource.
pub const SESSION_INFO_URI: &str = "mcp://resource/session-info";

const SERVER_NAME: &str = "medlock-server";

/// Mutable per-session state.
#[derive(Debug, Clone, Copy)]
pub struct SessionState {
    pub last_access: DateTime<Utc>,
    pub tool_execution_count: u64,
}

impl SessionState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_access: now,
            tool_execution_count: 0,
        }
    }
}

/// Medlock MCP server handler.
///
/// A new instance is created per MCP session by the `StreamableHttpService`
/// factory, so `state` is scoped to one downstream session.
#[derive(Clone)]
pub struct MedlockMcpServer {
    state: Arc<RwLock<SessionState>>,
    audit: AuditLog,
    base_url: String,
    tool_router: ToolRouter<Self>,
}

/// Extract the caller from rmcp request context.
///
/// In-process callers arrive with [`Identity`] in the request extensions.
/// Proxied callers carry the identity headers set by the gateway.
fn extract_identity(parts: &http::request::Parts) -> Result<Identity, ErrorData> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        return Ok(identity.clone());
    }

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let user_id = header(USER_ID_HEADER).ok_or_else(|| {
        ErrorData::new(
            ErrorCode::INTERNAL_ERROR,
            "Missing user context; the gateway did not attach an identity".to_string(),
            None,
        )
    })?;
    let username = header(USERNAME_HEADER).unwrap_or_else(|| user_id.clone());
    Ok(Identity {
        user_id,
        username,
        email: None,
        access_token: String::new(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ErrorData> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None))
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(to_json(value)?)]))
}

#[tool_router]
impl MedlockMcpServer {
    pub fn new(audit: AuditLog, base_url: String) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::new(Utc::now()))),
            audit,
            base_url,
            tool_router: Self::tool_router(),
        }
    }

    /// Return tool definitions registered in this server.
    #[cfg(test)]
    pub(crate) fn list_tools() -> Vec<rmcp::model::Tool> {
        Self::tool_router().list_all()
    }

    /// Snapshot of the session state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Count a tool execution, then audit it. Audit failures are logged and
    /// never fail the call. Returns the new count.
    async fn record_execution(
        &self,
        identity: &Identity,
        tool_name: &str,
        args: serde_json::Value,
    ) -> u64 {
        let execution_count = {
            let mut state = self.state.write().await;
            state.last_access = Utc::now();
            state.tool_execution_count += 1;
            state.tool_execution_count
        };
        debug!(user_id = %identity.user_id, tool = tool_name, execution_count, "tool call");

        let mut details = serde_json::json!({
            "tool": tool_name,
            "executionCount": execution_count,
        });
        if let (Some(details), serde_json::Value::Object(args)) = (details.as_object_mut(), args) {
            details.extend(args);
        }
        if let Err(e) = self.audit.record(&identity.user_id, TOOL_EXECUTION, details).await {
            warn!(user_id = %identity.user_id, tool = tool_name, "failed to record audit entry: {e}");
        }
        execution_count
    }

    /// Contents of the session-info resource. Reading it does not count as
    /// an execution.
    pub async fn session_info(&self, identity: &Identity) -> Result<ReadResourceResult, ErrorData> {
        let state = self.state().await;
        let info = SessionInfo {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            last_access_time: state.last_access.timestamp_millis(),
            tool_execution_count: state.tool_execution_count,
        };
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(to_json(&info)?, SESSION_INFO_URI)],
        })
    }

    /// Fetch latest vitals from the user's Solid Pod.
    #[tool(description = "Fetch latest vitals from the user's Solid Pod")]
    async fn solid_fetch_vitals(
        &self,
        Extension(parts): Extension<http::request::Parts>,
    ) -> Result<CallToolResult, ErrorData> {
        let identity = extract_identity(&parts)?;
        self.record_execution(&identity, "solid_fetch_vitals", serde_json::json!({}))
            .await;
        json_result(&vitals::latest_vitals())
    }

    /// Trigger a camera-based vitals scan.
    #[tool(description = "Trigger camera-based vitals scan.")]
    async fn vitals_scan(
        &self,
        Extension(parts): Extension<http::request::Parts>,
        Parameters(VitalsScanRequest { device }): Parameters<VitalsScanRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let identity = extract_identity(&parts)?;
        let args = serde_json::json!({ "device": device.as_str() });
        self.record_execution(&identity, "vitals_scan", args).await;
        json_result(&vitals::scan_instructions(&self.base_url, device))
    }
}

#[tool_handler]
impl ServerHandler for MedlockMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Medlock MCP server: personal vitals tools".into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: crate::version().into(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(vec![session_info_resource()]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        if request.uri != SESSION_INFO_URI {
            return Err(ErrorData::resource_not_found(
                format!("Unknown resource: {}", request.uri),
                None,
            ));
        }
        let parts = context
            .extensions
            .get::<http::request::Parts>()
            .ok_or_else(|| {
                ErrorData::new(
                    ErrorCode::INTERNAL_ERROR,
                    "Missing HTTP request context".to_string(),
                    None,
                )
            })?;
        let identity = extract_identity(parts)?;
        self.session_info(&identity).await
    }
}

/// Listing entry for the session-info resource.
pub fn session_info_resource() -> Resource {
    let mut raw = RawResource::new(SESSION_INFO_URI, "session-info");
    raw.description = Some("Current user and MCP session activity".into());
    raw.mime_type = Some("application/json".into());
    raw.no_annotation()
}
