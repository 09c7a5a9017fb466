//! promptx-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables and command-line overrides.
//! 2. Initialise structured tracing (JSON or pretty, console or daily files).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Wire the completion gateway, OAuth client and signing keys.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod auth;
mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::entities::SqlStore;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "promptx-server", version, about = "PromptX prompt enhancer API server")]
struct Cli {
    /// Address to listen on; overrides PROMPTX_BIND.
    #[arg(long)]
    bind: Option<String>,

    /// sqlx SQLite URL; overrides PROMPTX_DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Directory for daily-rolling log files; overrides PROMPTX_LOG_DIR.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(bind) = cli.bind {
        cfg.bind_address = bind;
    }
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }
    if cli.log_dir.is_some() {
        cfg.log_dir = cli.log_dir;
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PROMPTX_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    // The guard flushes buffered records on drop, so it lives until main returns.
    let (writer, _log_guard) = match &cfg.log_dir {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "promptx-server.log")),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(cfg.log_dir.is_none())
        .with_writer(writer);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "promptx-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqlStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Shared application state ────────────────────────────────────────────
    let bind_address = cfg.bind_address.clone();
    let state = Arc::new(AppState::new(cfg, store)?);
    if !state.gateway.is_configured() {
        warn!("no completion API key configured; /api/chat will answer 503");
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("promptx-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
