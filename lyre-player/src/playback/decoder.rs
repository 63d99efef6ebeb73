//! Decoder adapter
//!
//! Wraps the single playback resource and owns everything attached to it:
//! the audio-focus grant, the wake lock and the output-route registration.
//! The resource itself is opaque. It reports prepare, seek, completion and
//! error asynchronously through the mailbox, tagged with the `LoadToken` of
//! the load that produced them.
//!
//! Nothing here returns an error to the coordinator. A resource that cannot
//! be created is reported as `DecoderEvent::Error` like any other failure.

use crate::error::Result;
use crate::host::{AudioFocusManager, RouteMonitor, WakeLock};
use crate::playback::messages::{DecoderEvent, LoadToken, Mailbox};
use lyre_common::Track;
use tracing::{debug, info, warn};

/// Opaque playback resource with a prepare/play/pause/seek/stop lifecycle
///
/// Dropping the resource releases it.
pub trait PlaybackResource: Send {
    /// Begin preparing `source` at `start_ms`
    ///
    /// Reports `Prepared` or `Error` for `token`. Replaces whatever was
    /// loaded before.
    fn prepare(&mut self, token: LoadToken, source: &str, start_ms: u64);

    fn play(&mut self);

    fn pause(&mut self);

    /// Reports `SeekCompleted` or `Error` for `token`
    fn seek(&mut self, token: LoadToken, position_ms: u64);

    fn set_volume(&mut self, volume: f32);

    fn position_ms(&self) -> u64;

    fn stop(&mut self);
}

/// Creates playback resources on demand
pub trait ResourceFactory: Send {
    fn create(&mut self, mailbox: Mailbox) -> Result<Box<dyn PlaybackResource>>;
}

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Preparing,
    Ready,
    Playing,
    Paused,
    Stopped,
    Error,
}

/// Audio focus level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFocus {
    /// Must be silent
    None,
    /// May play at a lowered level
    Duck,
    Full,
}

/// What a focus change did to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    Unchanged,
    /// Paused with resume intent remembered
    Paused,
    Ducked,
    /// Volume restored after a duck
    Restored,
    /// Resume intent was set; the caller should resume playback
    Resume,
}

pub struct DecoderAdapter {
    factory: Box<dyn ResourceFactory>,
    resource: Option<Box<dyn PlaybackResource>>,
    mailbox: Mailbox,
    state: DecoderState,
    loaded: Option<LoadToken>,
    focus: AudioFocus,
    resume_on_gain: bool,
    duck_volume: f32,
    focus_manager: Box<dyn AudioFocusManager>,
    wake_lock: Box<dyn WakeLock>,
    wake_held: bool,
    /// Seek issued to the resource and not yet confirmed
    seeking: Option<LoadToken>,
    route_monitor: Box<dyn RouteMonitor>,
    route_registered: bool,
}

impl DecoderAdapter {
    pub fn new(
        factory: Box<dyn ResourceFactory>,
        mailbox: Mailbox,
        focus_manager: Box<dyn AudioFocusManager>,
        wake_lock: Box<dyn WakeLock>,
        route_monitor: Box<dyn RouteMonitor>,
        duck_volume: f32,
    ) -> Self {
        Self {
            factory,
            resource: None,
            mailbox,
            state: DecoderState::Idle,
            loaded: None,
            focus: AudioFocus::None,
            resume_on_gain: false,
            duck_volume: duck_volume.clamp(0.0, 1.0),
            focus_manager,
            wake_lock,
            wake_held: false,
            seeking: None,
            route_monitor,
            route_registered: false,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn focus(&self) -> AudioFocus {
        self.focus
    }

    pub fn resume_intent(&self) -> bool {
        self.resume_on_gain
    }

    /// Whether the wake lock is held for active decoding or output
    pub fn wake_lock_held(&self) -> bool {
        self.wake_held
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    /// Token of the most recent load
    pub fn loaded_token(&self) -> Option<LoadToken> {
        self.loaded
    }

    /// Load `track`, reusing the live resource if there is one
    pub fn load(&mut self, token: LoadToken, track: &Track, start_ms: u64) {
        if self.resource.is_none() {
            match self.factory.create(self.mailbox.clone()) {
                Ok(resource) => self.resource = Some(resource),
                Err(e) => {
                    warn!("Failed to create playback resource: {}", e);
                    self.state = DecoderState::Error;
                    self.loaded = Some(token);
                    self.mailbox.decoder(DecoderEvent::Error {
                        token,
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }

        if let Some(resource) = self.resource.as_mut() {
            debug!("Loading track {} ({}) as load {}", track.id, track.source, token);
            resource.prepare(token, &track.source, start_ms);
            self.loaded = Some(token);
            self.seeking = None;
            self.state = DecoderState::Preparing;
            self.hold_wake_lock();
        }
    }

    /// Record a prepare completion; false when `token` is not the current load
    pub fn on_prepared(&mut self, token: LoadToken) -> bool {
        if self.loaded != Some(token) || self.state != DecoderState::Preparing {
            return false;
        }
        self.state = DecoderState::Ready;
        self.drop_wake_lock();
        true
    }

    /// Record a seek confirmation; false when `token` is not the current load
    pub fn on_seek_completed(&mut self, token: LoadToken) -> bool {
        if self.loaded != Some(token) {
            return false;
        }
        self.seeking = None;
        if self.state != DecoderState::Playing {
            self.drop_wake_lock();
        }
        true
    }

    /// Record a failure reported by the resource for the current load
    pub fn on_error(&mut self, token: LoadToken) {
        if self.loaded == Some(token) {
            self.seeking = None;
            self.drop_wake_lock();
            self.state = DecoderState::Error;
        }
    }

    /// Record natural end of the loaded source
    pub fn on_completed(&mut self, token: LoadToken) {
        if self.loaded == Some(token) && self.state == DecoderState::Playing {
            self.drop_wake_lock();
            self.state = DecoderState::Paused;
        }
    }

    /// Start or resume output
    ///
    /// Returns false when there is nothing playable or focus was refused.
    pub fn play(&mut self) -> bool {
        if !matches!(
            self.state,
            DecoderState::Ready | DecoderState::Paused | DecoderState::Playing
        ) {
            return false;
        }
        let Some(resource) = self.resource.as_mut() else {
            return false;
        };

        if self.focus != AudioFocus::Full {
            if !self.focus_manager.request() {
                warn!("Audio focus request denied");
                return false;
            }
            self.focus = AudioFocus::Full;
        }

        resource.set_volume(1.0);
        resource.play();
        self.resume_on_gain = false;

        self.hold_wake_lock();
        self.state = DecoderState::Playing;
        if !self.route_registered {
            self.route_monitor.register(self.mailbox.clone());
            self.route_registered = true;
        }
        true
    }

    /// Pause output, keeping the resource; idempotent
    pub fn pause(&mut self) {
        if self.seeking.is_none() && self.state != DecoderState::Preparing {
            self.drop_wake_lock();
        }
        if matches!(self.state, DecoderState::Playing | DecoderState::Ready) {
            if let Some(resource) = self.resource.as_mut() {
                resource.pause();
            }
            self.state = DecoderState::Paused;
        }
    }

    /// Give focus back to the host and forget any resume intent
    pub fn abandon_focus(&mut self) {
        if self.focus != AudioFocus::None {
            self.focus_manager.abandon();
            self.focus = AudioFocus::None;
        }
        self.resume_on_gain = false;
    }

    /// Seek the loaded source; false when nothing seekable is loaded
    pub fn seek(&mut self, token: LoadToken, position_ms: u64) -> bool {
        if self.loaded != Some(token)
            || !matches!(
                self.state,
                DecoderState::Ready | DecoderState::Playing | DecoderState::Paused
            )
        {
            return false;
        }
        match self.resource.as_mut() {
            Some(resource) => {
                resource.seek(token, position_ms);
                self.seeking = Some(token);
                self.hold_wake_lock();
                true
            }
            None => false,
        }
    }

    pub fn position_ms(&self) -> u64 {
        self.resource.as_ref().map(|r| r.position_ms()).unwrap_or(0)
    }

    /// Drop the resource and everything attached to it
    pub fn release(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.stop();
            info!("Playback resource released");
        }
        self.seeking = None;
        self.drop_wake_lock();
        self.abandon_focus();
        if self.route_registered {
            self.route_monitor.unregister();
            self.route_registered = false;
        }
        self.loaded = None;
        self.state = DecoderState::Stopped;
    }

    /// Apply a focus loss
    ///
    /// With `can_duck` the output is only lowered. Otherwise playback pauses
    /// and, if the session was producing audio, resume intent is remembered.
    pub fn on_focus_loss(&mut self, can_duck: bool, session_active: bool) -> FocusAction {
        if can_duck {
            self.focus = AudioFocus::Duck;
            if let Some(resource) = self.resource.as_mut() {
                resource.set_volume(self.duck_volume);
            }
            return FocusAction::Ducked;
        }

        self.focus = AudioFocus::None;
        if session_active {
            self.pause();
            self.resume_on_gain = true;
            FocusAction::Paused
        } else {
            FocusAction::Unchanged
        }
    }

    pub fn on_focus_gain(&mut self) -> FocusAction {
        let previous = self.focus;
        self.focus = AudioFocus::Full;

        if self.resume_on_gain {
            self.resume_on_gain = false;
            return FocusAction::Resume;
        }
        if previous == AudioFocus::Duck {
            if let Some(resource) = self.resource.as_mut() {
                resource.set_volume(1.0);
            }
            return FocusAction::Restored;
        }
        FocusAction::Unchanged
    }

    fn hold_wake_lock(&mut self) {
        if !self.wake_held {
            self.wake_lock.acquire();
            self.wake_held = true;
        }
    }

    fn drop_wake_lock(&mut self) {
        if self.wake_held {
            self.wake_lock.release();
            self.wake_held = false;
        }
    }

    /// Apply an output route loss; true when playback was paused by it
    pub fn on_route_lost(&mut self) -> bool {
        if self.state == DecoderState::Playing {
            self.pause();
            self.resume_on_gain = false;
            true
        } else {
            false
        }
    }
}
