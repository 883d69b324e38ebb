//! Medlock gateway server binary.
//!
//! Serves the authenticated gateway on `BIND_ADDR`. MCP traffic is handled
//! in-process unless `DOWNSTREAM_URL` points at a remote MCP server; a
//! standalone MCP server for that topology can be started with `--mcp-port`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use medlock_api::config::GatewayConfig;
use medlock_api::downstream::{Downstream, LocalDownstream, RemoteDownstream};
use medlock_core::audit::AuditLog;
use medlock_core::auth::oauth::GitHubOAuth;
use medlock_core::kv::{KvStore, MemoryKvStore, PgKvStore};
use medlock_core::ratelimit::RateLimiter;

const PG_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// CLI arguments. Anything not given here is read from the environment by
/// [`GatewayConfig::from_env`].
#[derive(Parser, Debug)]
#[command(name = "medlock_server", about = "Medlock MCP gateway")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// PostgreSQL connection URL. In-memory stores are used when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Also serve the bare MCP server on this port, for gateways configured
    /// with `DOWNSTREAM_URL`.
    #[arg(long)]
    mcp_port: Option<u16>,
}

/// Token and audit backends.
struct Stores {
    tokens: Arc<dyn KvStore>,
    audit: Arc<dyn KvStore>,
}

async fn open_stores(
    args: &Args,
    ct: &CancellationToken,
) -> Result<Stores, Box<dyn std::error::Error>> {
    let Some(url) = args.database_url.as_deref() else {
        info!("using in-memory key-value stores");
        let tokens = Arc::new(MemoryKvStore::new());
        let audit = Arc::new(MemoryKvStore::new());
        tokens.spawn_cleanup_task(ct.clone());
        audit.spawn_cleanup_task(ct.clone());
        return Ok(Stores { tokens, audit });
    };

    info!(max_connections = args.max_connections, "connecting to PostgreSQL");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    info!("running database migrations");
    medlock_core::migrate::migrate(&pool).await?;

    let tokens = PgKvStore::new(pool.clone(), "tokens");
    let audit = PgKvStore::new(pool, "audit");
    spawn_pg_purge(vec![tokens.clone(), audit.clone()], ct.clone());

    Ok(Stores {
        tokens: Arc::new(tokens),
        audit: Arc::new(audit),
    })
}

fn spawn_pg_purge(stores: Vec<PgKvStore>, ct: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PG_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = ct.cancelled() => break,
                _ = interval.tick() => {
                    for store in &stores {
                        match store.purge_expired().await {
                            Ok(0) => {}
                            Ok(purged) => debug!(purged, "purged expired kv rows"),
                            Err(e) => warn!("kv purge failed: {e}"),
                        }
                    }
                }
            }
        }
    });
}

async fn shutdown_signal(ct: CancellationToken) {
    tokio::select! {
        _ = ct.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("failed to listen for ctrl-c: {e}");
            }
            info!("shutdown requested");
            ct.cancel();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,medlock_api=debug,medlock_core=debug,medlock_mcp=debug",
                )
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = GatewayConfig::from_env();
    if let Some(bind) = args.bind.clone() {
        config.bind_addr = bind;
    }
    config.database_url = args.database_url.clone();

    if config.oauth_client_id.is_empty() || config.oauth_client_secret.is_empty() {
        warn!("OAUTH_CLIENT_ID or OAUTH_CLIENT_SECRET is not set; logins will fail");
    }

    let ct = CancellationToken::new();
    let stores = open_stores(&args, &ct).await?;
    let audit = AuditLog::new(stores.audit.clone());

    let limiter = RateLimiter::new(config.rate_limit);
    limiter.spawn_sweeper(ct.clone());

    let downstream: Arc<dyn Downstream> = match config.downstream_url.as_deref() {
        Some(url) => {
            info!(downstream = %url, "forwarding MCP traffic to remote server");
            Arc::new(RemoteDownstream::new(url, config.max_body_bytes))
        }
        None => Arc::new(LocalDownstream::new(medlock_mcp::mcp_router(
            audit.clone(),
            config.base_url.clone(),
            ct.clone(),
        ))),
    };

    let oauth = Arc::new(GitHubOAuth::new(
        config.oauth_client_id.clone(),
        config.oauth_client_secret.clone(),
    ));

    let bind_addr = config.bind_addr.clone();
    let state = medlock_api::AppState::new(
        config.clone(),
        stores.tokens,
        stores.audit,
        Arc::new(limiter),
        oauth,
        downstream,
    );
    let app = medlock_api::router(state);

    let mcp_handle = match args.mcp_port {
        Some(port) => {
            let mcp_app = medlock_mcp::mcp_router(audit, config.base_url.clone(), ct.clone());
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
            info!(addr = %listener.local_addr()?, "MCP server listening");
            let mcp_ct = ct.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, mcp_app)
                    .with_graceful_shutdown(mcp_ct.cancelled_owned())
                    .await
            }))
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        version = medlock_api::version(),
        max_requests = config.rate_limit.max_requests,
        "gateway listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ct.clone()))
        .await;

    // Stop background tasks and the MCP listener along with the gateway.
    ct.cancel();
    if let Some(handle) = mcp_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("MCP server error: {e}"),
            Err(e) => warn!("MCP server task failed: {e}"),
        }
    }

    result?;
    info!("gateway stopped");
    Ok(())
}
