//! Session coordinator
//!
//! Single-threaded actor and sole authority over playback state and queue
//! position. Every input arrives as a `SessionMessage` and is handled to
//! completion before the next one is taken, so session state needs no
//! locks. The coordinator owns exactly one decoder adapter and one catalog
//! store reference.
//!
//! Decoder callbacks carry the `LoadToken` of the load they belong to. A
//! callback whose token is not the active load is stale and is dropped.

use crate::catalog::store::MetadataStore;
use crate::db::session_state::{PersistedSession, SessionStateSink};
use crate::host::HostSeams;
use crate::playback::decoder::{DecoderAdapter, FocusAction};
use crate::playback::messages::{
    CatalogEvent, Command, DecoderEvent, FocusEvent, LoadToken, Mailbox, PlayExtras, SessionMessage,
};
use crate::playback::publisher::{IdleTimer, Publisher};
use crate::playback::queue::{self, build_queue, index_of, navigate, Direction, EntryRef, Queue};
use crate::playback::{SessionConfig, SessionParts};
use crate::state::SharedState;
use lyre_common::config::EndOfQueuePolicy;
use lyre_common::events::{EntryId, PlaybackStatus, SessionSnapshot};
use lyre_common::{Selector, TrackId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The load most recently issued to the decoder
#[derive(Debug, Clone, Copy)]
struct ActiveLoad {
    token: LoadToken,
    entry_id: EntryId,
    /// Prepare completed
    ready: bool,
    /// Start output as soon as the load is prepared
    autoplay: bool,
}

pub struct Coordinator {
    store: Arc<MetadataStore>,
    catalog_loaded: bool,
    /// Commands received before the first catalog load, in arrival order
    deferred: Vec<Command>,
    restored: Option<PersistedSession>,

    queue: Queue,
    last_selector: Option<Selector>,
    shuffle: bool,

    status: PlaybackStatus,
    position_ms: u64,
    next_token: u64,
    load: Option<ActiveLoad>,
    /// Start position for the next load of the current entry
    pending_seek: Option<u64>,
    resume_after_seek: bool,

    decoder: DecoderAdapter,
    publisher: Publisher,
    persistence: Box<dyn SessionStateSink>,
    end_of_queue: EndOfQueuePolicy,
    rng: StdRng,
    running: bool,
}

impl Coordinator {
    pub fn new(parts: SessionParts, mailbox: Mailbox, state: Arc<SharedState>) -> Self {
        let SessionParts {
            factory,
            host,
            persistence,
            restored,
            config,
        } = parts;
        let HostSeams {
            focus,
            wake_lock,
            route_monitor,
            foreground,
        } = host;
        let SessionConfig {
            end_of_queue,
            duck_volume,
            idle_stop_timeout,
            ..
        } = config;

        let decoder = DecoderAdapter::new(
            factory,
            mailbox.clone(),
            focus,
            wake_lock,
            route_monitor,
            duck_volume,
        );
        let publisher = Publisher::new(state, foreground, IdleTimer::new(idle_stop_timeout, mailbox));

        Self {
            store: Arc::new(MetadataStore::new()),
            catalog_loaded: false,
            deferred: Vec::new(),
            last_selector: restored.last_selector,
            shuffle: restored.shuffle,
            restored: Some(restored),
            queue: Queue::empty(),
            status: PlaybackStatus::NoSession,
            position_ms: 0,
            next_token: 0,
            load: None,
            pending_seek: None,
            resume_after_seek: false,
            decoder,
            publisher,
            persistence,
            end_of_queue,
            rng: StdRng::from_entropy(),
            running: true,
        }
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn decoder(&self) -> &DecoderAdapter {
        &self.decoder
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> &SessionSnapshot {
        self.publisher.last()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drain the inbox until shutdown
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionMessage>) {
        info!("Session coordinator started");
        while self.running {
            let Some(message) = inbox.recv().await else {
                self.shutdown("inbox closed").await;
                break;
            };
            self.handle(message).await;
        }
        info!("Session coordinator stopped");
    }

    /// Apply one message
    pub async fn handle(&mut self, message: SessionMessage) {
        if !self.running {
            debug!("Session is shut down, dropping {:?}", message);
            return;
        }
        match message {
            SessionMessage::Command(command) => self.on_command(command).await,
            SessionMessage::Decoder(event) => self.on_decoder_event(event).await,
            SessionMessage::Focus(event) => self.on_focus(event).await,
            SessionMessage::TimerFired { generation } => self.on_timer(generation).await,
            SessionMessage::Catalog(event) => self.on_catalog(event).await,
        }
    }

    // ========================================
    // Commands
    // ========================================

    async fn on_command(&mut self, command: Command) {
        if !self.catalog_loaded
            && command != Command::Shutdown
            && (command.needs_catalog() || !self.deferred.is_empty())
        {
            debug!("Deferring {:?} until the catalog is loaded", command);
            self.deferred.push(command);
            return;
        }

        debug!("Command: {:?}", command);
        match command {
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::Stop => self.stop("stopped by request").await,
            Command::SeekTo(position_ms) => self.seek(position_ms).await,
            Command::SkipToNext => self.advance(Direction::Next).await,
            Command::SkipToPrevious => self.advance(Direction::Previous).await,
            Command::SkipToQueueEntry(entry_id) => self.skip_to_entry(entry_id).await,
            Command::PlayFromSelector { selector, extras } => {
                self.play_from_selector(selector, extras).await
            }
            Command::SetShuffleMode(enabled) => self.set_shuffle(enabled).await,
            Command::Shutdown => self.shutdown("shutdown").await,
        }
    }

    async fn play(&mut self) {
        if self.queue.is_empty() {
            let Some(selector) = self.last_selector else {
                info!("Play requested with no queue and no previous selector");
                self.enter_idle().await;
                return;
            };
            self.queue = self.materialize(selector, None);
            self.publisher
                .queue_changed(Some(selector), self.queue.len(), self.shuffle);
            if self.queue.is_empty() {
                info!("Nothing to play: {} is empty", selector);
                self.enter_idle().await;
                return;
            }
            let start = self.pending_seek.take().unwrap_or(0);
            self.start_current(start).await;
            return;
        }

        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => debug!("Already playing"),
            PlaybackStatus::Paused if self.current_is_loaded() => self.resume().await,
            _ => {
                let start = self.pending_seek.take().unwrap_or(0);
                self.start_current(start).await;
            }
        }
    }

    async fn pause(&mut self) {
        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => {
                self.position_ms = self.current_position();
                self.halt_output();
                self.status = PlaybackStatus::Paused;
                self.publish().await;
            }
            PlaybackStatus::Paused => {
                // A focus-loss pause becomes a user pause: no resume on regain
                debug!("Already paused");
                self.halt_output();
            }
            _ => debug!("Pause ignored in state {}", self.status),
        }
    }

    async fn stop(&mut self, reason: &str) {
        if self.status == PlaybackStatus::Stopped {
            debug!("Already stopped");
            return;
        }
        self.release_decoder();
        if !matches!(self.status, PlaybackStatus::NoSession | PlaybackStatus::Idle) {
            self.status = PlaybackStatus::Stopped;
            self.position_ms = 0;
            self.publish().await;
        }
        self.publisher.session_stopped(reason);
    }

    async fn seek(&mut self, position_ms: u64) {
        let Some(entry) = self.queue.current() else {
            warn!("Seek ignored: queue is empty");
            return;
        };
        let duration_ms = entry.track.duration_ms;
        let target = if duration_ms > 0 {
            position_ms.min(duration_ms)
        } else {
            position_ms
        };

        let seekable = matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused);
        match self.load {
            Some(load) if load.ready && seekable && self.current_is_loaded() => {
                if !self.decoder.seek(load.token, target) {
                    warn!("Decoder refused seek to {} ms", target);
                    return;
                }
                self.position_ms = target;
                if self.status == PlaybackStatus::Playing {
                    self.resume_after_seek = true;
                    self.status = PlaybackStatus::Buffering;
                }
                self.publish().await;
            }
            _ => {
                debug!("Seek to {} ms deferred until the entry is loaded", target);
                self.pending_seek = Some(target);
                self.position_ms = target;
                self.publish().await;
            }
        }
    }

    async fn skip_to_entry(&mut self, entry_id: EntryId) {
        let Some(index) = index_of(&self.queue, EntryRef::Entry(entry_id)) else {
            warn!("Skip to unknown queue entry {}", entry_id);
            return;
        };
        self.queue.set_current(index);
        self.pending_seek = None;
        self.start_current(0).await;
    }

    async fn play_from_selector(&mut self, selector: Selector, extras: PlayExtras) {
        self.last_selector = Some(selector);
        self.load = None;

        let queue = self.materialize(selector, extras.start_track);
        let len = queue.len();
        self.queue = queue;
        self.publisher.queue_changed(Some(selector), len, self.shuffle);

        if self.queue.is_empty() {
            info!("Nothing to play: {} is empty", selector);
            self.persist();
            self.enter_idle().await;
            return;
        }

        info!("Playing {} ({} entries)", selector, len);
        self.pending_seek = None;
        self.start_current(extras.start_position_ms).await;
    }

    async fn set_shuffle(&mut self, enabled: bool) {
        if enabled == self.shuffle {
            debug!("Shuffle already {}", if enabled { "on" } else { "off" });
            return;
        }
        self.shuffle = enabled;
        if enabled {
            queue::shuffle(&mut self.queue, &mut self.rng);
        } else {
            queue::sort_to_build_order(&mut self.queue);
        }
        info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });

        self.publisher
            .queue_changed(self.queue.selector(), self.queue.len(), enabled);
        self.persist();
        self.publish().await;
    }

    async fn shutdown(&mut self, reason: &str) {
        self.release_decoder();
        self.deferred.clear();
        self.status = PlaybackStatus::NoSession;
        self.position_ms = 0;
        self.publish().await;
        self.publisher.session_stopped(reason);
        self.running = false;
    }

    // ========================================
    // Decoder callbacks
    // ========================================

    async fn on_decoder_event(&mut self, event: DecoderEvent) {
        match event {
            DecoderEvent::Prepared { token } => self.on_prepared(token).await,
            DecoderEvent::SeekCompleted { token, position_ms } => {
                self.on_seek_completed(token, position_ms).await
            }
            DecoderEvent::Completed { token } => self.on_completed(token).await,
            DecoderEvent::Error { token, message } => self.on_decoder_error(token, message).await,
            DecoderEvent::OutputRouteLost => self.on_route_lost().await,
        }
    }

    /// The active load if `token` belongs to it
    fn active_load(&self, token: LoadToken, event: &str) -> Option<ActiveLoad> {
        match self.load {
            Some(load) if load.token == token => Some(load),
            _ => {
                debug!("Discarding stale {} for load {}", event, token);
                None
            }
        }
    }

    async fn on_prepared(&mut self, token: LoadToken) {
        let Some(load) = self.active_load(token, "prepared") else {
            return;
        };
        if !self.decoder.on_prepared(token) {
            debug!("Discarding duplicate prepared for load {}", token);
            return;
        }
        if let Some(active) = self.load.as_mut() {
            active.ready = true;
        }

        if let Some(position_ms) = self.pending_seek.take() {
            if self.decoder.seek(token, position_ms) {
                self.position_ms = position_ms;
                self.resume_after_seek = load.autoplay;
                self.publish().await;
                return;
            }
        }

        if load.autoplay {
            self.begin_output().await;
        } else {
            self.publish().await;
        }
    }

    async fn on_seek_completed(&mut self, token: LoadToken, position_ms: u64) {
        if self.active_load(token, "seek completion").is_none() {
            return;
        }
        self.decoder.on_seek_completed(token);
        self.position_ms = position_ms;
        if self.resume_after_seek {
            self.resume_after_seek = false;
            self.begin_output().await;
        } else {
            self.publish().await;
        }
    }

    async fn on_completed(&mut self, token: LoadToken) {
        if self.active_load(token, "completion").is_none() {
            return;
        }
        self.decoder.on_completed(token);
        self.load = None;
        debug!("Load {} played to the end", token);
        self.advance(Direction::Next).await;
    }

    async fn on_decoder_error(&mut self, token: LoadToken, message: String) {
        if self.active_load(token, "error").is_none() {
            return;
        }
        warn!("Playback error on load {}: {}", token, message);
        self.decoder.on_error(token);
        self.decoder.abandon_focus();
        if let Some(active) = self.load.as_mut() {
            active.ready = false;
            active.autoplay = false;
        }
        self.resume_after_seek = false;
        self.status = PlaybackStatus::Error(message);
        self.publish().await;
    }

    async fn on_route_lost(&mut self) {
        if !self.status.is_active() {
            debug!("Output route lost while {}", self.status);
            return;
        }
        info!("Output route lost, pausing");
        self.position_ms = self.current_position();
        self.decoder.on_route_lost();
        self.decoder.pause();
        if let Some(active) = self.load.as_mut() {
            active.autoplay = false;
        }
        self.resume_after_seek = false;
        self.status = PlaybackStatus::Paused;
        self.publish().await;
    }

    // ========================================
    // Focus, timer, catalog
    // ========================================

    async fn on_focus(&mut self, event: FocusEvent) {
        match event {
            FocusEvent::LostCanDuck => {
                self.decoder.on_focus_loss(true, self.status.is_active());
                debug!("Audio focus lost, ducking");
            }
            FocusEvent::Lost => {
                let position_ms = self.current_position();
                if self.decoder.on_focus_loss(false, self.status.is_active()) == FocusAction::Paused {
                    info!("Audio focus lost, pausing until it returns");
                    self.position_ms = position_ms;
                    if let Some(active) = self.load.as_mut() {
                        active.autoplay = false;
                    }
                    self.resume_after_seek = false;
                    self.status = PlaybackStatus::Paused;
                    self.publish().await;
                }
            }
            FocusEvent::Gained => {
                let action = self.decoder.on_focus_gain();
                if action == FocusAction::Resume && self.status == PlaybackStatus::Paused {
                    info!("Audio focus regained, resuming");
                    if self.current_is_loaded() {
                        self.resume().await;
                    } else {
                        self.start_current(self.position_ms).await;
                    }
                }
            }
        }
    }

    async fn on_timer(&mut self, generation: u64) {
        if !self.publisher.take_timer_fire(generation) {
            return;
        }
        if !matches!(self.status, PlaybackStatus::Paused | PlaybackStatus::Stopped) {
            debug!("Idle timer fired while {}, ignoring", self.status);
            return;
        }
        info!("Idle timeout reached, ending session");
        self.release_decoder();
        self.status = PlaybackStatus::NoSession;
        self.position_ms = 0;
        self.publish().await;
        self.publisher.session_stopped("idle timeout");
    }

    async fn on_catalog(&mut self, event: CatalogEvent) {
        match event {
            CatalogEvent::Loaded(store) => self.install_store(store).await,
            CatalogEvent::LoadFailed(message) => {
                warn!("Catalog unavailable ({}), continuing with an empty library", message);
                self.install_store(Arc::new(MetadataStore::new())).await;
            }
            CatalogEvent::RowChanged(delta) => {
                debug!("Applying catalog row change: {:?}", delta);
                self.store = Arc::new(self.store.with_delta(delta));
            }
        }
    }

    async fn install_store(&mut self, store: Arc<MetadataStore>) {
        info!("Catalog store installed ({} tracks)", store.len());
        self.store = store;
        if self.catalog_loaded {
            return;
        }
        self.catalog_loaded = true;

        if let Some(restored) = self.restored.take() {
            self.restore(restored).await;
        }

        let deferred = std::mem::take(&mut self.deferred);
        if !deferred.is_empty() {
            debug!("Replaying {} deferred commands", deferred.len());
        }
        for command in deferred {
            self.on_command(command).await;
        }
    }

    /// Rebuild the queue saved before the last restart, without playing it
    async fn restore(&mut self, restored: PersistedSession) {
        let Some(selector) = restored.last_selector else {
            return;
        };
        if !self.queue.is_empty() {
            return;
        }

        let queue = self.materialize(selector, restored.last_track_id);
        if queue.is_empty() {
            debug!("Saved selector {} no longer yields any tracks", selector);
            return;
        }
        info!("Restored queue for {} ({} entries)", selector, queue.len());
        self.queue = queue;
        self.publisher
            .queue_changed(Some(selector), self.queue.len(), self.shuffle);
        if self.status == PlaybackStatus::NoSession {
            self.status = PlaybackStatus::Idle;
        }
        self.publish().await;
    }

    // ========================================
    // Helpers
    // ========================================

    /// Build a queue for `selector` starting at `start_track` (or the first
    /// entry), shuffled with the start entry first when shuffle is on
    fn materialize(&mut self, selector: Selector, start_track: Option<TrackId>) -> Queue {
        let mut built = build_queue(selector, &self.store);

        if let Some(track_id) = start_track {
            match index_of(&built, EntryRef::Track(track_id)) {
                Some(index) => {
                    built.set_current(index);
                }
                None => warn!("Start track {} is not in {}", track_id, selector),
            }
        }

        if self.shuffle {
            if let Some(start) = built.current().map(|e| e.entry_id) {
                queue::shuffle(&mut built, &mut self.rng);
                built.move_to_front(start);
            }
        }
        built
    }

    /// Navigate and apply the result; shared by explicit skips and natural
    /// completion
    async fn advance(&mut self, direction: Direction) {
        let Some(index) = self.queue.current_index() else {
            self.stop("no queue entry to move to").await;
            return;
        };
        let Some(nav) = navigate(&self.queue, index, direction) else {
            self.stop("no queue entry to move to").await;
            return;
        };

        if nav.end_of_queue {
            self.wrap_to_start().await;
        } else {
            self.move_to(nav.index).await;
        }
    }

    /// Move the current index; starts the new entry only if audio was
    /// playing (or failed), otherwise only now-playing changes
    async fn move_to(&mut self, index: usize) {
        self.queue.set_current(index);
        self.pending_seek = None;
        self.position_ms = 0;

        if self.status.is_active() || matches!(self.status, PlaybackStatus::Error(_)) {
            self.start_current(0).await;
        } else {
            self.load = None;
            self.persist();
            self.publish().await;
        }
    }

    async fn wrap_to_start(&mut self) {
        match self.end_of_queue {
            EndOfQueuePolicy::Loop => {
                self.publisher.end_of_queue(true);
                self.move_to(0).await;
            }
            EndOfQueuePolicy::PauseAtStart => {
                self.publisher.end_of_queue(false);
                self.queue.set_current(0);
                self.pending_seek = None;
                self.position_ms = 0;
                if self.status.is_active() || matches!(self.status, PlaybackStatus::Error(_)) {
                    self.halt_output();
                    self.status = PlaybackStatus::Paused;
                }
                self.load = None;
                self.persist();
                self.publish().await;
            }
        }
    }

    /// Issue a load for the current entry and enter Buffering
    async fn start_current(&mut self, start_ms: u64) {
        let Some(entry) = self.queue.current().cloned() else {
            error!(
                "Queue index {:?} resolves to no entry",
                self.queue.current_index()
            );
            self.status = PlaybackStatus::Error("queue position has no track".to_string());
            self.publish().await;
            return;
        };

        self.next_token += 1;
        let token = LoadToken(self.next_token);
        self.load = Some(ActiveLoad {
            token,
            entry_id: entry.entry_id,
            ready: false,
            autoplay: true,
        });
        self.pending_seek = None;
        self.resume_after_seek = false;
        self.position_ms = start_ms;

        info!(
            "Loading entry {} (track {}: {}) as load {}",
            entry.entry_id, entry.track.id, entry.track.title, token
        );
        self.decoder.load(token, &entry.track, start_ms);
        self.status = PlaybackStatus::Buffering;
        self.persist();
        self.publish().await;
    }

    /// Resume the loaded current entry in place
    async fn resume(&mut self) {
        let Some(active) = self.load.as_mut() else {
            return;
        };
        if !active.ready {
            active.autoplay = true;
            self.status = PlaybackStatus::Buffering;
            self.publish().await;
        } else {
            self.begin_output().await;
        }
    }

    async fn begin_output(&mut self) {
        if self.decoder.play() {
            self.status = PlaybackStatus::Playing;
        } else {
            warn!("Playback could not start");
            if let Some(active) = self.load.as_mut() {
                active.autoplay = false;
            }
            self.status = PlaybackStatus::Paused;
        }
        self.publish().await;
    }

    /// Pause the decoder and give up focus, keeping the resource
    fn halt_output(&mut self) {
        self.decoder.pause();
        self.decoder.abandon_focus();
        if let Some(active) = self.load.as_mut() {
            active.autoplay = false;
        }
        self.resume_after_seek = false;
    }

    async fn enter_idle(&mut self) {
        if self.decoder.has_resource() {
            self.release_decoder();
        }
        self.load = None;
        self.position_ms = 0;
        self.status = PlaybackStatus::Idle;
        self.publish().await;
    }

    fn release_decoder(&mut self) {
        self.decoder.release();
        self.load = None;
        self.pending_seek = None;
        self.resume_after_seek = false;
    }

    fn current_is_loaded(&self) -> bool {
        match (self.load, self.queue.current()) {
            (Some(load), Some(entry)) => load.entry_id == entry.entry_id && self.decoder.has_resource(),
            _ => false,
        }
    }

    fn current_position(&self) -> u64 {
        match self.load {
            Some(load) if load.ready => self.decoder.position_ms(),
            _ => self.position_ms,
        }
    }

    fn persist(&mut self) {
        let state = PersistedSession {
            last_selector: self.last_selector,
            last_track_id: self.queue.current().map(|e| e.track.id),
            shuffle: self.shuffle,
        };
        self.persistence.save(&state);
    }

    async fn publish(&mut self) {
        self.publisher
            .publish(&self.status, self.position_ms, &self.queue, self.shuffle)
            .await;
    }
}
