//! HTTP server setup and routing
//!
//! Sets up the Axum router with the control endpoints and the SSE feed.

use crate::error::{Error, Result};
use crate::playback::SessionHandle;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: SessionHandle,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Session reads
        .route("/session", get(super::handlers::get_session))
        .route("/session/now-playing", get(super::handlers::get_now_playing))
        // Transport
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/previous", post(super::handlers::skip_previous))
        .route("/playback/seek", post(super::handlers::seek))
        .route("/playback/skip-to", post(super::handlers::skip_to))
        .route("/playback/selector", post(super::handlers::play_from_selector))
        .route("/playback/shuffle", post(super::handlers::set_shuffle))
        // Host and catalog notifications
        .route("/host/focus", post(super::handlers::focus_changed))
        .route("/catalog/rows/:id/changed", post(super::handlers::catalog_row_changed))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local display surfaces
        .layer(CorsLayer::permissive())
}

/// Serve `router` on `listen_addr` until `shutdown` resolves
pub async fn run(
    listen_addr: &str,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind to {}: {}", listen_addr, e)))?;

    info!("Starting HTTP server on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
