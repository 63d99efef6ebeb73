//! Playback-related type definitions
//!
//! Supporting types for the published session snapshot.

use crate::model::Track;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synthetic id of one queue entry
///
/// Assigned in build order and unique only within one queue build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// No session exists (startup, or ended by the idle timer)
    NoSession,
    /// Session exists but there is nothing to play
    Idle,
    /// Waiting on the decoder (prepare or seek)
    Buffering,
    Playing,
    Paused,
    Stopped,
    /// Recoverable playback failure; cleared by Play or Stop
    Error(String),
}

impl PlaybackStatus {
    /// Whether audio is playing or about to play
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Buffering | PlaybackStatus::Playing)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::NoSession => write!(f, "no_session"),
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Buffering => write!(f, "buffering"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Stopped => write!(f, "stopped"),
            PlaybackStatus::Error(message) => write!(f, "error({})", message),
        }
    }
}

bitflags! {
    /// Transport actions a surface may currently offer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LegalActions: u32 {
        const PLAY = 1 << 0;
        const PAUSE = 1 << 1;
        const STOP = 1 << 2;
        const SEEK = 1 << 3;
        const SKIP_NEXT = 1 << 4;
        const SKIP_PREVIOUS = 1 << 5;
        const SKIP_TO_ENTRY = 1 << 6;
        const PLAY_FROM_SELECTOR = 1 << 7;
        const SET_SHUFFLE = 1 << 8;
    }
}

/// Immutable session snapshot
///
/// A new snapshot is built for every transition; published snapshots are
/// never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub position_ms: u64,
    /// When `position_ms` was sampled
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Playback speed (1.0 while playing, 0.0 otherwise)
    pub speed: f32,
    pub active_entry_id: Option<EntryId>,
    pub legal_actions: LegalActions,
    pub error_message: Option<String>,
    pub queue_len: usize,
    pub queue_index: Option<usize>,
    pub shuffle: bool,
}

impl SessionSnapshot {
    /// Snapshot published before any session exists
    pub fn no_session() -> Self {
        Self {
            status: PlaybackStatus::NoSession,
            position_ms: 0,
            updated_at: chrono::Utc::now(),
            speed: 0.0,
            active_entry_id: None,
            legal_actions: LegalActions::PLAY | LegalActions::PLAY_FROM_SELECTOR | LegalActions::SET_SHUFFLE,
            error_message: None,
            queue_len: 0,
            queue_index: None,
            shuffle: false,
        }
    }
}

/// Now-playing metadata for the active queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub entry_id: EntryId,
    pub track: Track,
    pub queue_index: usize,
    pub queue_len: usize,
}
