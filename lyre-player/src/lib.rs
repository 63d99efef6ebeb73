//! lyre-player library
//!
//! Background playback session for a local music library. Exposes the
//! session engine (catalog projection, queue, decoder adapter, coordinator
//! actor, publisher) and its HTTP control surface for use by the binary and
//! integration tests.

pub mod api;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
