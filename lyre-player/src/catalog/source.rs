//! Catalog collaborator
//!
//! The catalog itself (scanning, relational storage) lives outside the
//! session. The session only consumes two operations: a full load and a
//! single-row refresh. Both run on background tasks and report back to the
//! coordinator as `CatalogEvent` messages, so the actor never blocks on them.

use crate::catalog::store::MetadataStore;
use crate::error::Result;
use crate::playback::messages::{CatalogEvent, Mailbox, SessionMessage};
use futures::future::BoxFuture;
use lyre_common::{PlaylistId, Track, TrackId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Raw result of a full catalog load
#[derive(Debug, Clone, Default)]
pub struct CatalogRows {
    pub tracks: Vec<Track>,
    /// (playlist, member) pairs
    pub playlist_members: Vec<(PlaylistId, TrackId)>,
}

/// Single-row catalog change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackDelta {
    /// Row inserted or updated; `playlists` is its full membership list
    Upsert {
        track: Track,
        playlists: Vec<PlaylistId>,
    },
    Removed(TrackId),
}

/// Source of catalog rows
pub trait CatalogSource: Send + Sync {
    fn load_catalog(&self) -> BoxFuture<'_, Result<CatalogRows>>;

    fn load_row(&self, id: TrackId) -> BoxFuture<'_, Result<TrackDelta>>;
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    rows: CatalogRows,
}

impl StaticCatalog {
    pub fn new(rows: CatalogRows) -> Self {
        Self { rows }
    }
}

impl CatalogSource for StaticCatalog {
    fn load_catalog(&self) -> BoxFuture<'_, Result<CatalogRows>> {
        Box::pin(async move { Ok(self.rows.clone()) })
    }

    fn load_row(&self, id: TrackId) -> BoxFuture<'_, Result<TrackDelta>> {
        Box::pin(async move {
            let delta = match self.rows.tracks.iter().find(|t| t.id == id) {
                Some(track) => TrackDelta::Upsert {
                    track: track.clone(),
                    playlists: self
                        .rows
                        .playlist_members
                        .iter()
                        .filter(|(_, member)| *member == id)
                        .map(|(playlist, _)| *playlist)
                        .collect(),
                },
                None => TrackDelta::Removed(id),
            };
            Ok(delta)
        })
    }
}

/// Runs catalog work in the background and posts the results to the session
#[derive(Clone)]
pub struct CatalogService {
    source: Arc<dyn CatalogSource>,
    mailbox: Mailbox,
}

impl CatalogService {
    pub fn new(source: Arc<dyn CatalogSource>, mailbox: Mailbox) -> Self {
        Self { source, mailbox }
    }

    /// Load the whole catalog and build the store off the actor
    pub fn spawn_full_load(&self) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let event = match source.load_catalog().await {
                Ok(rows) => {
                    let store = MetadataStore::from_rows(rows);
                    info!("Catalog loaded: {} tracks", store.len());
                    CatalogEvent::Loaded(Arc::new(store))
                }
                Err(e) => {
                    warn!("Catalog load failed: {}", e);
                    CatalogEvent::LoadFailed(e.to_string())
                }
            };
            mailbox.post(SessionMessage::Catalog(event));
        })
    }

    /// Re-read one row after a targeted change notification
    pub fn spawn_row_refresh(&self, id: TrackId) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            match source.load_row(id).await {
                Ok(delta) => {
                    mailbox.post(SessionMessage::Catalog(CatalogEvent::RowChanged(delta)));
                }
                Err(e) => warn!("Catalog row {} refresh failed: {}", id, e),
            }
        })
    }
}
