//! Shared fakes for session integration tests
//!
//! Unless `auto_prepare` is set, the fake playback resource never calls back
//! on its own: tests deliver decoder events by hand so every interleaving is
//! deterministic.

#![allow(dead_code)]

use lyre_common::events::{NowPlaying, SessionEvent, SessionSnapshot};
use lyre_common::{AlbumId, ArtistId, PlaylistId, Track, TrackId};
use lyre_player::catalog::{CatalogRows, MetadataStore};
use lyre_player::db::{PersistedSession, SessionStateSink};
use lyre_player::error::{Error, Result};
use lyre_player::host::{AudioFocusManager, ForegroundHost, HostSeams, RouteMonitor, WakeLock};
use lyre_player::playback::messages::CatalogEvent;
use lyre_player::playback::{
    Command, Coordinator, DecoderEvent, FocusEvent, LoadToken, Mailbox, PlaybackResource,
    ResourceFactory, SessionConfig, SessionMessage, SessionParts,
};
use lyre_player::SharedState;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Playback resource
// ============================================================================

/// Everything the fake resources were asked to do
#[derive(Debug, Default)]
pub struct AudioLog {
    pub created: usize,
    /// Resources not yet dropped
    pub alive: usize,
    pub max_alive: usize,
    pub prepares: Vec<(LoadToken, String, u64)>,
    pub seeks: Vec<(LoadToken, u64)>,
    pub plays: usize,
    pub pauses: usize,
    pub stops: usize,
    pub volume: f32,
    /// Reported playback position
    pub position_ms: u64,
    pub fail_create: bool,
    /// Report `Prepared` as soon as a prepare is issued
    pub auto_prepare: bool,
}

pub type SharedAudio = Arc<Mutex<AudioLog>>;

pub struct FakeFactory {
    log: SharedAudio,
}

impl ResourceFactory for FakeFactory {
    fn create(&mut self, mailbox: Mailbox) -> Result<Box<dyn PlaybackResource>> {
        let mut log = self.log.lock().unwrap();
        if log.fail_create {
            return Err(Error::AudioOutput("no output device".to_string()));
        }
        log.created += 1;
        log.alive += 1;
        log.max_alive = log.max_alive.max(log.alive);
        Ok(Box::new(FakeResource {
            log: Arc::clone(&self.log),
            mailbox,
        }))
    }
}

struct FakeResource {
    log: SharedAudio,
    mailbox: Mailbox,
}

impl PlaybackResource for FakeResource {
    fn prepare(&mut self, token: LoadToken, source: &str, start_ms: u64) {
        let auto_prepare = {
            let mut log = self.log.lock().unwrap();
            log.prepares.push((token, source.to_string(), start_ms));
            log.position_ms = start_ms;
            log.auto_prepare
        };
        if auto_prepare {
            self.mailbox.decoder(DecoderEvent::Prepared { token });
        }
    }

    fn play(&mut self) {
        self.log.lock().unwrap().plays += 1;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().pauses += 1;
    }

    fn seek(&mut self, token: LoadToken, position_ms: u64) {
        self.log.lock().unwrap().seeks.push((token, position_ms));
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.lock().unwrap().volume = volume;
    }

    fn position_ms(&self) -> u64 {
        self.log.lock().unwrap().position_ms
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }
}

impl Drop for FakeResource {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.alive -= 1;
        }
    }
}

// ============================================================================
// Host seams
// ============================================================================

#[derive(Debug)]
pub struct HostLog {
    pub grant_focus: bool,
    pub focus_requests: usize,
    pub focus_held: bool,
    pub wake_lock_held: bool,
    pub route_registered: bool,
    pub foreground_visible: bool,
    pub foreground_updates: usize,
}

impl Default for HostLog {
    fn default() -> Self {
        Self {
            grant_focus: true,
            focus_requests: 0,
            focus_held: false,
            wake_lock_held: false,
            route_registered: false,
            foreground_visible: false,
            foreground_updates: 0,
        }
    }
}

pub type SharedHost = Arc<Mutex<HostLog>>;

struct FakeFocus(SharedHost);

impl AudioFocusManager for FakeFocus {
    fn request(&mut self) -> bool {
        let mut log = self.0.lock().unwrap();
        log.focus_requests += 1;
        log.focus_held = log.grant_focus;
        log.grant_focus
    }

    fn abandon(&mut self) {
        self.0.lock().unwrap().focus_held = false;
    }
}

struct FakeWakeLock(SharedHost);

impl WakeLock for FakeWakeLock {
    fn acquire(&mut self) {
        self.0.lock().unwrap().wake_lock_held = true;
    }

    fn release(&mut self) {
        self.0.lock().unwrap().wake_lock_held = false;
    }
}

struct FakeRouteMonitor(SharedHost);

impl RouteMonitor for FakeRouteMonitor {
    fn register(&mut self, _mailbox: Mailbox) {
        self.0.lock().unwrap().route_registered = true;
    }

    fn unregister(&mut self) {
        self.0.lock().unwrap().route_registered = false;
    }
}

struct FakeForeground(SharedHost);

impl ForegroundHost for FakeForeground {
    fn update(&mut self, _snapshot: &SessionSnapshot, _now_playing: Option<&NowPlaying>) {
        let mut log = self.0.lock().unwrap();
        log.foreground_visible = true;
        log.foreground_updates += 1;
    }

    fn exit(&mut self) {
        self.0.lock().unwrap().foreground_visible = false;
    }
}

/// Session state sink that keeps every save in memory
pub struct MemorySink(pub Arc<Mutex<Vec<PersistedSession>>>);

impl SessionStateSink for MemorySink {
    fn save(&mut self, state: &PersistedSession) {
        self.0.lock().unwrap().push(state.clone());
    }
}

// ============================================================================
// Catalog fixtures
// ============================================================================

pub fn track(id: i64, title: &str, album: i64, number: u32) -> Track {
    Track {
        id: TrackId(id),
        title: title.to_string(),
        title_key: Track::title_key_for(title),
        album_id: AlbumId(album),
        artist_id: ArtistId(1),
        duration_ms: 180_000,
        disc_number: 1,
        track_number: number,
        art_ref: None,
        source: format!("/music/{}.flac", id),
    }
}

/// Album 1 holds Alpha, Bravo and Charlie (tracks 1-3) in that order;
/// album 2 holds Delta. Playlist 7 holds Bravo and Delta.
pub fn sample_rows() -> CatalogRows {
    CatalogRows {
        tracks: vec![
            track(1, "Alpha", 1, 1),
            track(2, "Bravo", 1, 2),
            track(3, "Charlie", 1, 3),
            track(4, "Delta", 2, 1),
        ],
        playlist_members: vec![(PlaylistId(7), TrackId(2)), (PlaylistId(7), TrackId(4))],
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Shared logs behind one set of fake collaborators
#[derive(Clone, Default)]
pub struct Fakes {
    pub audio: SharedAudio,
    pub host: SharedHost,
    pub saved: Arc<Mutex<Vec<PersistedSession>>>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session collaborators recording into these logs
    pub fn parts(&self, config: SessionConfig, restored: PersistedSession) -> SessionParts {
        SessionParts {
            factory: Box::new(FakeFactory {
                log: Arc::clone(&self.audio),
            }),
            host: HostSeams {
                focus: Box::new(FakeFocus(Arc::clone(&self.host))),
                wake_lock: Box::new(FakeWakeLock(Arc::clone(&self.host))),
                route_monitor: Box::new(FakeRouteMonitor(Arc::clone(&self.host))),
                foreground: Box::new(FakeForeground(Arc::clone(&self.host))),
            },
            persistence: Box::new(MemorySink(Arc::clone(&self.saved))),
            restored,
            config,
        }
    }
}

/// A coordinator driven message by message
pub struct Harness {
    pub coordinator: Coordinator,
    pub inbox: mpsc::UnboundedReceiver<SessionMessage>,
    pub mailbox: Mailbox,
    pub state: Arc<SharedState>,
    pub audio: SharedAudio,
    pub host: SharedHost,
    pub saved: Arc<Mutex<Vec<PersistedSession>>>,
    pub events: broadcast::Receiver<SessionEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(SessionConfig::default(), PersistedSession::default())
    }

    pub fn with(config: SessionConfig, restored: PersistedSession) -> Self {
        let fakes = Fakes::new();
        let parts = fakes.parts(config, restored);

        let (mailbox, inbox) = Mailbox::channel();
        let state = Arc::new(SharedState::new(256));
        let events = state.subscribe_events();
        let coordinator = Coordinator::new(parts, mailbox.clone(), Arc::clone(&state));

        Self {
            coordinator,
            inbox,
            mailbox,
            state,
            audio: fakes.audio,
            host: fakes.host,
            saved: fakes.saved,
            events,
        }
    }

    /// Harness with the sample catalog already installed
    pub async fn loaded() -> Self {
        let mut harness = Self::new();
        harness.load_catalog(sample_rows()).await;
        harness
    }

    pub async fn load_catalog(&mut self, rows: CatalogRows) {
        let store = Arc::new(MetadataStore::from_rows(rows));
        self.send(SessionMessage::Catalog(CatalogEvent::Loaded(store)))
            .await;
    }

    pub async fn send(&mut self, message: SessionMessage) {
        self.coordinator.handle(message).await;
    }

    pub async fn command(&mut self, command: Command) {
        self.send(SessionMessage::Command(command)).await;
    }

    pub async fn decoder(&mut self, event: DecoderEvent) {
        self.send(SessionMessage::Decoder(event)).await;
    }

    pub async fn focus(&mut self, event: FocusEvent) {
        self.send(SessionMessage::Focus(event)).await;
    }

    /// Token of the most recent prepare
    pub fn last_token(&self) -> LoadToken {
        self.audio
            .lock()
            .unwrap()
            .prepares
            .last()
            .map(|(token, _, _)| *token)
            .expect("no load issued")
    }

    /// Complete the most recent prepare
    pub async fn prepared(&mut self) {
        let token = self.last_token();
        self.decoder(DecoderEvent::Prepared { token }).await;
    }

    pub fn load_count(&self) -> usize {
        self.audio.lock().unwrap().prepares.len()
    }

    pub fn set_position(&self, position_ms: u64) {
        self.audio.lock().unwrap().position_ms = position_ms;
    }

    pub fn current_track(&self) -> Option<TrackId> {
        self.coordinator.queue().current().map(|e| e.track.id)
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        self.coordinator.snapshot()
    }

    /// Events broadcast since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
