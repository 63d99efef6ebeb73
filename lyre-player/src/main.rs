//! lyre-player - Main entry point
//!
//! Background playback session service: loads the catalog from the session
//! database, runs the session actor against the rodio output and serves the
//! HTTP control surface until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lyre_common::config::TomlConfig;
use lyre_player::api::{self, AppContext};
use lyre_player::audio::{CpalRouteMonitor, RodioFactory};
use lyre_player::config::{Args, Config};
use lyre_player::db::{self, SessionStateWriter, SqliteCatalog};
use lyre_player::host::HostSeams;
use lyre_player::playback::{self, SessionParts};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let file = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = Config::resolve(&args, file);

    init_tracing(&config)?;

    info!("Starting lyre-player v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.db_path.display());

    // Session database: catalog tables and persisted session state
    let pool = db::init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    let restored = match db::session_state::load(&pool).await {
        Ok(state) => state,
        Err(e) => {
            warn!("Ignoring unreadable session state: {}", e);
            Default::default()
        }
    };
    let (writer, writer_task) = SessionStateWriter::spawn(pool.clone());

    let parts = SessionParts {
        factory: Box::new(RodioFactory),
        host: HostSeams::desktop(Box::new(CpalRouteMonitor::new(config.route_poll_interval))),
        persistence: Box::new(writer),
        restored,
        config: config.session.clone(),
    };
    let (session, session_task) =
        playback::start_session(parts, Arc::new(SqliteCatalog::new(pool.clone())));
    info!("Playback session started");

    // Build the application router
    let app = api::create_router(AppContext {
        session: session.clone(),
    });

    api::server::run(&config.listen_addr(), app, shutdown_signal())
        .await
        .context("Server error")?;

    // Release the session before the database goes away
    if session.shutdown().is_ok() {
        if let Err(e) = session_task.await {
            warn!("Session task ended abnormally: {}", e);
        }
    }
    drop(session);
    if let Err(e) = writer_task.await {
        warn!("Session state writer ended abnormally: {}", e);
    }
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Stderr logging, or file logging when `logging.file` is set
fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "lyre_player={level},lyre_common={level},tower_http=info",
            level = config.log_level
        )
        .into()
    });

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
