//! Playback session
//!
//! The queue engine, the decoder adapter, the coordinator actor, the
//! publisher and the transport handle, plus `start_session` which wires them
//! together.

pub mod coordinator;
pub mod decoder;
pub mod handle;
pub mod messages;
pub mod publisher;
pub mod queue;

pub use coordinator::Coordinator;
pub use decoder::{DecoderAdapter, PlaybackResource, ResourceFactory};
pub use handle::SessionHandle;
pub use messages::{Command, DecoderEvent, FocusEvent, LoadToken, Mailbox, PlayExtras, SessionMessage};

use crate::catalog::source::{CatalogService, CatalogSource};
use crate::db::session_state::{PersistedSession, SessionStateSink};
use crate::host::HostSeams;
use crate::state::SharedState;
use lyre_common::config::{EndOfQueuePolicy, PlaybackConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Session tuning resolved from configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub end_of_queue: EndOfQueuePolicy,
    pub duck_volume: f32,
    /// Zero disables the idle-stop timer
    pub idle_stop_timeout: Duration,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for SessionConfig {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            end_of_queue: config.end_of_queue,
            duck_volume: config.duck_volume,
            idle_stop_timeout: Duration::from_secs(config.idle_stop_timeout_secs),
            event_capacity: config.event_capacity,
        }
    }
}

/// Collaborators injected into a session
pub struct SessionParts {
    pub factory: Box<dyn ResourceFactory>,
    pub host: HostSeams,
    pub persistence: Box<dyn SessionStateSink>,
    /// State saved before the last restart
    pub restored: PersistedSession,
    pub config: SessionConfig,
}

/// Spawn the coordinator and start the first catalog load
pub fn start_session(
    parts: SessionParts,
    catalog: Arc<dyn CatalogSource>,
) -> (SessionHandle, JoinHandle<()>) {
    let (mailbox, inbox) = Mailbox::channel();
    let state = Arc::new(SharedState::new(parts.config.event_capacity));
    let catalog = CatalogService::new(catalog, mailbox.clone());

    let coordinator = Coordinator::new(parts, mailbox.clone(), Arc::clone(&state));
    let task = tokio::spawn(coordinator.run(inbox));
    catalog.spawn_full_load();

    (SessionHandle::new(mailbox, state, Some(catalog)), task)
}
