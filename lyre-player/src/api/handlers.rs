//! HTTP request handlers
//!
//! Transport commands are accepted and applied asynchronously by the session
//! actor, so command endpoints answer `202 Accepted`. Read the outcome from
//! `/session` or the `/events` stream.

use crate::api::server::AppContext;
use crate::error::{Error, Result};
use crate::playback::{FocusEvent, PlayExtras};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lyre_common::events::{EntryId, NowPlaying, SessionSnapshot};
use lyre_common::{Selector, TrackId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SkipToRequest {
    entry_id: EntryId,
}

#[derive(Debug, Deserialize)]
pub struct SelectorRequest {
    /// Selector string, e.g. `ALBUM:12`
    selector: String,
    #[serde(default)]
    start_track_id: Option<TrackId>,
    #[serde(default)]
    start_position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ShuffleRequest {
    enabled: bool,
}

/// Focus level reported by the host
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLevel {
    None,
    Duck,
    Full,
}

impl From<FocusLevel> for FocusEvent {
    fn from(level: FocusLevel) -> Self {
        match level {
            FocusLevel::None => FocusEvent::Lost,
            FocusLevel::Duck => FocusEvent::LostCanDuck,
            FocusLevel::Full => FocusEvent::Gained,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    focus: FocusLevel,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::BadRequest(_) | Error::Common(lyre_common::Error::InvalidSelector(_)) => {
            StatusCode::BAD_REQUEST
        }
        Error::SessionClosed | Error::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Request failed: {}", e);
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

fn accepted(result: Result<()>) -> std::result::Result<StatusCode, ApiError> {
    result.map(|()| StatusCode::ACCEPTED).map_err(error_response)
}

// ============================================================================
// Health and Session Reads
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "lyre-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /session
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.session.snapshot().await)
}

/// GET /session/now-playing
///
/// `null` when nothing is selected.
pub async fn get_now_playing(State(ctx): State<AppContext>) -> Json<Option<NowPlaying>> {
    Json(ctx.session.now_playing().await)
}

// ============================================================================
// Transport
// ============================================================================

pub async fn play(State(ctx): State<AppContext>) -> std::result::Result<StatusCode, ApiError> {
    info!("Play request");
    accepted(ctx.session.play())
}

pub async fn pause(State(ctx): State<AppContext>) -> std::result::Result<StatusCode, ApiError> {
    info!("Pause request");
    accepted(ctx.session.pause())
}

pub async fn stop(State(ctx): State<AppContext>) -> std::result::Result<StatusCode, ApiError> {
    info!("Stop request");
    accepted(ctx.session.stop())
}

pub async fn skip_next(
    State(ctx): State<AppContext>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Skip next request");
    accepted(ctx.session.skip_to_next())
}

pub async fn skip_previous(
    State(ctx): State<AppContext>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Skip previous request");
    accepted(ctx.session.skip_to_previous())
}

pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Seek request: {}ms", req.position_ms);
    accepted(ctx.session.seek_to(req.position_ms))
}

pub async fn skip_to(
    State(ctx): State<AppContext>,
    Json(req): Json<SkipToRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Skip to queue entry {}", req.entry_id);
    accepted(ctx.session.skip_to_queue_entry(req.entry_id))
}

pub async fn play_from_selector(
    State(ctx): State<AppContext>,
    Json(req): Json<SelectorRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Play from selector request: {}", req.selector);

    let selector: Selector = req
        .selector
        .parse()
        .map_err(|e: lyre_common::Error| error_response(e.into()))?;
    let extras = PlayExtras {
        start_track: req.start_track_id,
        start_position_ms: req.start_position_ms,
    };

    accepted(ctx.session.play_from_selector(selector, extras))
}

pub async fn set_shuffle(
    State(ctx): State<AppContext>,
    Json(req): Json<ShuffleRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Set shuffle request: {}", req.enabled);
    accepted(ctx.session.set_shuffle_mode(req.enabled))
}

// ============================================================================
// Host and Catalog Notifications
// ============================================================================

/// POST /host/focus
pub async fn focus_changed(
    State(ctx): State<AppContext>,
    Json(req): Json<FocusRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Audio focus changed: {:?}", req.focus);
    accepted(ctx.session.focus_changed(req.focus.into()))
}

/// POST /catalog/rows/:id/changed
pub async fn catalog_row_changed(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> std::result::Result<StatusCode, ApiError> {
    info!("Catalog row {} changed", id);
    accepted(ctx.session.catalog_row_changed(TrackId(id)))
}
