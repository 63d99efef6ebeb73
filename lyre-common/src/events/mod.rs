//! Event types for the Lyre event system
//!
//! Provides the outbound session event definitions and the EventBus that fans
//! them out to display surfaces and notification renderers.

mod playback_types;

pub use playback_types::{EntryId, LegalActions, NowPlaying, PlaybackStatus, SessionSnapshot};

use crate::model::Selector;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Outbound session events
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A transition was applied; carries the new immutable snapshot
    ///
    /// Triggers:
    /// - SSE: Update transport controls
    /// - Notification renderer: Re-render (track, state)
    StateChanged {
        snapshot: SessionSnapshot,
    },

    /// The active queue entry changed (or was cleared)
    NowPlayingChanged {
        now_playing: Option<NowPlaying>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A queue was materialized or reordered
    QueueChanged {
        selector: Option<Selector>,
        len: usize,
        shuffle: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Navigation ran past the last entry and the end-of-queue policy applied
    EndOfQueue {
        looped: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session was stopped with a reason (navigation impossible, idle
    /// timeout, shutdown)
    SessionStopped {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "StateChanged",
            SessionEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            SessionEvent::QueueChanged { .. } => "QueueChanged",
            SessionEvent::EndOfQueue { .. } => "EndOfQueue",
            SessionEvent::SessionStopped { .. } => "SessionStopped",
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the coordinator)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lyre_common::events::{EventBus, SessionEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SessionEvent::EndOfQueue {
///     looped: false,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(SessionEvent::EndOfQueue { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
