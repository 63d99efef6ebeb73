//! Shared session state
//!
//! Read side of the session: the last published snapshot, the now-playing
//! entry and the event bus. Written only by the session publisher, read by
//! the transport handle, the HTTP surface and any display surface.

use lyre_common::events::{EventBus, NowPlaying, SessionEvent, SessionSnapshot};
use tokio::sync::{broadcast, RwLock};

/// State shared between the session actor and its readers
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    /// Last published snapshot
    pub snapshot: RwLock<SessionSnapshot>,

    /// Active queue entry (None when the queue is empty)
    pub now_playing: RwLock<Option<NowPlaying>>,

    /// Event broadcaster for SSE and display surfaces
    pub event_bus: EventBus,
}

impl SharedState {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            snapshot: RwLock::new(SessionSnapshot::no_session()),
            now_playing: RwLock::new(None),
            event_bus: EventBus::new(event_capacity),
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: SessionEvent) {
        self.event_bus.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_bus.subscribe()
    }

    pub async fn get_snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn set_snapshot(&self, snapshot: SessionSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    pub async fn get_now_playing(&self) -> Option<NowPlaying> {
        self.now_playing.read().await.clone()
    }

    pub async fn set_now_playing(&self, now_playing: Option<NowPlaying>) {
        *self.now_playing.write().await = now_playing;
    }
}
