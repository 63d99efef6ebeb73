//! Inbound session messages
//!
//! Every input the coordinator reacts to (transport commands, decoder
//! callbacks, audio-focus changes, the idle timer, catalog completions) is
//! one `SessionMessage` on a single mpsc channel. The coordinator drains that
//! channel one message at a time.

use crate::catalog::source::TrackDelta;
use crate::catalog::store::MetadataStore;
use lyre_common::events::EntryId;
use lyre_common::{Selector, TrackId};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Load-sequence token
///
/// Every `load()` issued to the decoder gets a fresh token. Decoder callbacks
/// echo it back, which is how stale callbacks are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(pub u64);

impl fmt::Display for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Optional parameters for `PlayFromSelector`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PlayExtras {
    /// Start at this track instead of the first entry
    #[serde(default)]
    pub start_track: Option<TrackId>,
    #[serde(default)]
    pub start_position_ms: u64,
}

/// Transport commands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    SkipToNext,
    SkipToPrevious,
    SkipToQueueEntry(EntryId),
    PlayFromSelector {
        selector: Selector,
        extras: PlayExtras,
    },
    SetShuffleMode(bool),
    /// Release everything and end the actor loop
    Shutdown,
}

impl Command {
    /// Commands that cannot be served before the first catalog load
    pub fn needs_catalog(&self) -> bool {
        matches!(
            self,
            Command::Play | Command::PlayFromSelector { .. } | Command::SkipToQueueEntry(_)
        )
    }
}

/// Callbacks from the playback resource and route monitor
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    Prepared { token: LoadToken },
    SeekCompleted { token: LoadToken, position_ms: u64 },
    Completed { token: LoadToken },
    Error { token: LoadToken, message: String },
    /// The active output route disappeared (headphones unplugged, Bluetooth
    /// sink gone)
    OutputRouteLost,
}

/// Host audio-focus changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    /// Another stream took focus and we must go silent
    Lost,
    /// Another stream took focus but we may keep playing quietly
    LostCanDuck,
    /// Focus returned
    Gained,
}

/// Catalog load completions
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Loaded(Arc<MetadataStore>),
    LoadFailed(String),
    RowChanged(TrackDelta),
}

/// One inbound message
#[derive(Debug, Clone)]
pub enum SessionMessage {
    Command(Command),
    Decoder(DecoderEvent),
    Focus(FocusEvent),
    TimerFired { generation: u64 },
    Catalog(CatalogEvent),
}

/// Sending half of the session inbox
///
/// Cheap to clone; handed to the playback resource, the route monitor, the
/// idle timer, the catalog service and the transport handle.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl Mailbox {
    pub fn new(tx: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { tx }
    }

    /// Create a mailbox and the receiving end the coordinator drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Post a message; returns false once the session has shut down
    pub fn post(&self, message: SessionMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!("Session inbox closed, dropping {:?}", e.0);
                false
            }
        }
    }

    pub fn decoder(&self, event: DecoderEvent) -> bool {
        self.post(SessionMessage::Decoder(event))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_dependent_commands() {
        assert!(Command::Play.needs_catalog());
        assert!(Command::SkipToQueueEntry(EntryId(1)).needs_catalog());
        assert!(Command::PlayFromSelector {
            selector: Selector::AllTracks,
            extras: PlayExtras::default(),
        }
        .needs_catalog());
        assert!(!Command::Pause.needs_catalog());
        assert!(!Command::Stop.needs_catalog());
        assert!(!Command::SetShuffleMode(true).needs_catalog());
    }

    #[test]
    fn test_post_after_close_reports_false() {
        let (mailbox, rx) = Mailbox::channel();
        assert!(mailbox.post(SessionMessage::Command(Command::Play)));

        drop(rx);
        assert!(mailbox.is_closed());
        assert!(!mailbox.decoder(DecoderEvent::OutputRouteLost));
    }
}
