//! Session publisher
//!
//! Turns coordinator state into the externally observable feed: immutable
//! snapshots and now-playing metadata written to `SharedState` and broadcast
//! on the event bus. Also drives the foreground lifecycle and the idle-stop
//! timer.

use crate::host::ForegroundHost;
use crate::playback::messages::{Mailbox, SessionMessage};
use crate::playback::queue::Queue;
use crate::state::SharedState;
use chrono::Utc;
use lyre_common::events::{
    LegalActions, NowPlaying, PlaybackStatus, SessionEvent, SessionSnapshot,
};
use lyre_common::Selector;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Transport actions available for a given status and queue position
pub fn legal_actions(status: &PlaybackStatus, queue_len: usize, index: Option<usize>) -> LegalActions {
    let mut actions = LegalActions::PLAY_FROM_SELECTOR | LegalActions::SET_SHUFFLE;

    if status.is_active() {
        actions |= LegalActions::PAUSE;
    } else {
        actions |= LegalActions::PLAY;
    }

    if matches!(
        status,
        PlaybackStatus::Buffering
            | PlaybackStatus::Playing
            | PlaybackStatus::Paused
            | PlaybackStatus::Error(_)
    ) {
        actions |= LegalActions::STOP;
    }

    if let Some(index) = index.filter(|i| *i < queue_len) {
        if matches!(status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            actions |= LegalActions::SEEK;
        }
        if index + 1 < queue_len {
            actions |= LegalActions::SKIP_NEXT;
        }
        if index > 0 {
            actions |= LegalActions::SKIP_PREVIOUS;
        }
        actions |= LegalActions::SKIP_TO_ENTRY;
    }

    actions
}

/// Cancellable deferred `TimerFired` message
///
/// Every arm or cancel bumps the generation, so a fire that was already
/// queued before a rearm is recognized as stale.
pub struct IdleTimer {
    timeout: Option<Duration>,
    mailbox: Mailbox,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl IdleTimer {
    /// A zero timeout disables the timer
    pub fn new(timeout: Duration, mailbox: Mailbox) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            mailbox,
            generation: 0,
            handle: None,
        }
    }

    pub fn arm(&mut self) {
        self.cancel();
        let Some(timeout) = self.timeout else {
            return;
        };

        let generation = self.generation;
        let mailbox = self.mailbox.clone();
        debug!("Idle timer armed for {:?} (generation {})", timeout, generation);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            mailbox.post(SessionMessage::TimerFired { generation });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Idle timer cancelled (generation {})", self.generation);
        }
        self.generation += 1;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether a fire with `generation` belongs to the pending arm
    pub fn is_current(&self, generation: u64) -> bool {
        self.handle.is_some() && generation == self.generation
    }
}

pub struct Publisher {
    state: Arc<SharedState>,
    foreground: Box<dyn ForegroundHost>,
    in_foreground: bool,
    timer: IdleTimer,
    last: SessionSnapshot,
    now_playing: Option<NowPlaying>,
}

impl Publisher {
    pub fn new(state: Arc<SharedState>, foreground: Box<dyn ForegroundHost>, timer: IdleTimer) -> Self {
        Self {
            state,
            foreground,
            in_foreground: false,
            timer,
            last: SessionSnapshot::no_session(),
            now_playing: None,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn timer(&self) -> &IdleTimer {
        &self.timer
    }

    /// Last published snapshot
    pub fn last(&self) -> &SessionSnapshot {
        &self.last
    }

    /// Publish the state after a transition
    ///
    /// Skipped when nothing observable changed since the last snapshot.
    pub async fn publish(&mut self, status: &PlaybackStatus, position_ms: u64, queue: &Queue, shuffle: bool) {
        self.publish_now_playing(queue, status).await;

        let queue_index = match status {
            PlaybackStatus::NoSession => None,
            _ => queue.current_index(),
        };
        let snapshot = SessionSnapshot {
            status: status.clone(),
            position_ms,
            updated_at: Utc::now(),
            speed: if *status == PlaybackStatus::Playing { 1.0 } else { 0.0 },
            active_entry_id: queue_index.and_then(|i| queue.get(i)).map(|e| e.entry_id),
            legal_actions: legal_actions(status, queue.len(), queue_index),
            error_message: match status {
                PlaybackStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
            queue_len: queue.len(),
            queue_index,
            shuffle,
        };

        if self.same_as_last(&snapshot) {
            return;
        }

        let entering = self.last.status != snapshot.status;
        if entering {
            info!("Session state: {} -> {}", self.last.status, snapshot.status);
        }

        self.update_foreground(&snapshot);
        if entering {
            self.update_timer(&snapshot.status);
        }

        self.state.set_snapshot(snapshot.clone()).await;
        self.state.broadcast_event(SessionEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        self.last = snapshot;
    }

    async fn publish_now_playing(&mut self, queue: &Queue, status: &PlaybackStatus) {
        let now_playing = match status {
            PlaybackStatus::NoSession => None,
            _ => queue.current().map(|entry| NowPlaying {
                entry_id: entry.entry_id,
                track: (*entry.track).clone(),
                queue_index: queue.current_index().unwrap_or(0),
                queue_len: queue.len(),
            }),
        };
        if now_playing == self.now_playing {
            return;
        }

        if let Some(np) = &now_playing {
            debug!("Now playing: entry {} track {} ({})", np.entry_id, np.track.id, np.track.title);
        }
        self.state.set_now_playing(now_playing.clone()).await;
        self.state.broadcast_event(SessionEvent::NowPlayingChanged {
            now_playing: now_playing.clone(),
            timestamp: Utc::now(),
        });
        self.now_playing = now_playing;
    }

    fn same_as_last(&self, snapshot: &SessionSnapshot) -> bool {
        let last = &self.last;
        last.status == snapshot.status
            && last.position_ms == snapshot.position_ms
            && last.active_entry_id == snapshot.active_entry_id
            && last.legal_actions == snapshot.legal_actions
            && last.queue_len == snapshot.queue_len
            && last.queue_index == snapshot.queue_index
            && last.shuffle == snapshot.shuffle
    }

    fn update_foreground(&mut self, snapshot: &SessionSnapshot) {
        match snapshot.status {
            PlaybackStatus::Buffering | PlaybackStatus::Playing | PlaybackStatus::Paused => {
                self.foreground.update(snapshot, self.now_playing.as_ref());
                self.in_foreground = true;
            }
            PlaybackStatus::Error(_) => {
                if self.in_foreground {
                    self.foreground.update(snapshot, self.now_playing.as_ref());
                }
            }
            PlaybackStatus::NoSession | PlaybackStatus::Idle | PlaybackStatus::Stopped => {
                if self.in_foreground {
                    self.foreground.exit();
                    self.in_foreground = false;
                }
            }
        }
    }

    fn update_timer(&mut self, status: &PlaybackStatus) {
        match status {
            PlaybackStatus::Paused | PlaybackStatus::Stopped => self.timer.arm(),
            PlaybackStatus::Buffering | PlaybackStatus::Playing | PlaybackStatus::NoSession => {
                self.timer.cancel()
            }
            PlaybackStatus::Idle | PlaybackStatus::Error(_) => {}
        }
    }

    /// Consume a timer fire; false when it is stale
    pub fn take_timer_fire(&mut self, generation: u64) -> bool {
        if !self.timer.is_current(generation) {
            debug!("Ignoring stale idle timer fire (generation {})", generation);
            return false;
        }
        self.timer.cancel();
        true
    }

    pub fn queue_changed(&self, selector: Option<Selector>, len: usize, shuffle: bool) {
        self.state.broadcast_event(SessionEvent::QueueChanged {
            selector,
            len,
            shuffle,
            timestamp: Utc::now(),
        });
    }

    pub fn end_of_queue(&self, looped: bool) {
        info!("End of queue reached (looped: {})", looped);
        self.state.broadcast_event(SessionEvent::EndOfQueue {
            looped,
            timestamp: Utc::now(),
        });
    }

    pub fn session_stopped(&self, reason: &str) {
        info!("Session stopped: {}", reason);
        self.state.broadcast_event(SessionEvent::SessionStopped {
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DesktopForeground;
    use crate::playback::messages::Mailbox;

    #[test]
    fn test_legal_actions_without_queue() {
        let actions = legal_actions(&PlaybackStatus::Idle, 0, None);
        assert!(actions.contains(LegalActions::PLAY));
        assert!(!actions.contains(LegalActions::PAUSE));
        assert!(!actions.contains(LegalActions::SKIP_NEXT));
        assert!(!actions.contains(LegalActions::SKIP_PREVIOUS));
        assert!(!actions.contains(LegalActions::SEEK));
        assert!(!actions.contains(LegalActions::STOP));
    }

    #[test]
    fn test_legal_actions_follow_queue_bounds() {
        let first = legal_actions(&PlaybackStatus::Playing, 3, Some(0));
        assert!(first.contains(LegalActions::PAUSE | LegalActions::SEEK | LegalActions::SKIP_NEXT));
        assert!(!first.contains(LegalActions::SKIP_PREVIOUS));
        assert!(!first.contains(LegalActions::PLAY));

        let last = legal_actions(&PlaybackStatus::Paused, 3, Some(2));
        assert!(last.contains(LegalActions::PLAY | LegalActions::SKIP_PREVIOUS));
        assert!(!last.contains(LegalActions::SKIP_NEXT));
    }

    #[test]
    fn test_legal_actions_in_error_allow_skipping() {
        let actions = legal_actions(&PlaybackStatus::Error("bad file".into()), 3, Some(0));
        assert!(actions.contains(LegalActions::SKIP_NEXT | LegalActions::STOP | LegalActions::PLAY));
        assert!(!actions.contains(LegalActions::SEEK));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_fires_once() {
        let (mailbox, mut rx) = Mailbox::channel();
        let mut timer = IdleTimer::new(Duration::from_secs(5), mailbox);
        timer.arm();

        tokio::time::sleep(Duration::from_secs(6)).await;
        match rx.try_recv() {
            Ok(SessionMessage::TimerFired { generation }) => assert!(timer.is_current(generation)),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_previous_fire() {
        let (mailbox, mut rx) = Mailbox::channel();
        let mut timer = IdleTimer::new(Duration::from_secs(5), mailbox);
        timer.arm();
        tokio::time::sleep(Duration::from_secs(3)).await;
        timer.arm();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let Ok(SessionMessage::TimerFired { generation }) = rx.try_recv() else {
            panic!("expected one fire");
        };
        assert!(timer.is_current(generation));
        assert!(!timer.is_current(generation - 1));
    }

    #[tokio::test]
    async fn test_zero_timeout_disables_timer() {
        let (mailbox, _rx) = Mailbox::channel();
        let mut timer = IdleTimer::new(Duration::ZERO, mailbox);
        timer.arm();
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn test_publish_skips_unchanged_snapshots() {
        let state = Arc::new(SharedState::new(16));
        let mut rx = state.subscribe_events();
        let (mailbox, _inbox) = Mailbox::channel();
        let mut publisher = Publisher::new(
            Arc::clone(&state),
            Box::new(DesktopForeground::default()),
            IdleTimer::new(Duration::ZERO, mailbox),
        );
        let queue = Queue::empty();

        publisher.publish(&PlaybackStatus::Idle, 0, &queue, false).await;
        publisher.publish(&PlaybackStatus::Idle, 0, &queue, false).await;

        assert!(matches!(rx.try_recv(), Ok(SessionEvent::StateChanged { .. })));
        assert!(rx.try_recv().is_err());
        assert_eq!(state.get_snapshot().await.status, PlaybackStatus::Idle);
    }
}
