//! # Lyre Common Library
//!
//! Shared code for the Lyre playback service and anything that renders its
//! state (display surfaces, notification renderers):
//! - Catalog model types (`Track`, ids, `Selector`)
//! - Session snapshot and event types (`SessionEvent` enum, `EventBus`)
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{AlbumId, ArtistId, PlaylistId, Selector, Track, TrackId};
