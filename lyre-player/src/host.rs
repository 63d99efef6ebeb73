//! Host platform seams
//!
//! The session depends on four host services: audio-focus arbitration, a
//! wake lock held while decoding, the foreground lifecycle (a visible
//! notification keeping the process alive) and output-route monitoring.
//! Each is a trait so platform integrations and test fakes can be injected.
//! The desktop implementations here grant focus unconditionally and only log
//! the rest.

use crate::playback::messages::Mailbox;
use lyre_common::events::{NowPlaying, SessionSnapshot};
use tracing::{debug, info};

/// Arbitration of the right to produce audible output
pub trait AudioFocusManager: Send {
    /// Request full focus; returns whether it was granted
    fn request(&mut self) -> bool;

    fn abandon(&mut self);
}

/// Keeps the host from suspending the process while audio is decoding
pub trait WakeLock: Send {
    fn acquire(&mut self);

    fn release(&mut self);
}

/// Foreground lifecycle: a visible notification while the session is alive
pub trait ForegroundHost: Send {
    /// Enter the foreground, or refresh the notification if already there
    fn update(&mut self, snapshot: &SessionSnapshot, now_playing: Option<&NowPlaying>);

    fn exit(&mut self);
}

/// Watches the active output route while playback is in progress
///
/// Implementations post `DecoderEvent::OutputRouteLost` through the mailbox
/// when the route disappears.
pub trait RouteMonitor: Send {
    fn register(&mut self, mailbox: Mailbox);

    fn unregister(&mut self);
}

/// Host services injected into a session
pub struct HostSeams {
    pub focus: Box<dyn AudioFocusManager>,
    pub wake_lock: Box<dyn WakeLock>,
    pub route_monitor: Box<dyn RouteMonitor>,
    pub foreground: Box<dyn ForegroundHost>,
}

impl HostSeams {
    /// Desktop seams around the given route monitor
    pub fn desktop(route_monitor: Box<dyn RouteMonitor>) -> Self {
        Self {
            focus: Box::new(DesktopFocus::default()),
            wake_lock: Box::new(DesktopWakeLock::default()),
            route_monitor,
            foreground: Box::new(DesktopForeground::default()),
        }
    }
}

/// Desktop mixers share the output; focus is always granted
#[derive(Debug, Default)]
pub struct DesktopFocus {
    held: bool,
}

impl AudioFocusManager for DesktopFocus {
    fn request(&mut self) -> bool {
        if !self.held {
            debug!("Audio focus granted");
            self.held = true;
        }
        true
    }

    fn abandon(&mut self) {
        if self.held {
            debug!("Audio focus abandoned");
            self.held = false;
        }
    }
}

#[derive(Debug, Default)]
pub struct DesktopWakeLock {
    held: bool,
}

impl WakeLock for DesktopWakeLock {
    fn acquire(&mut self) {
        if !self.held {
            debug!("Wake lock acquired");
            self.held = true;
        }
    }

    fn release(&mut self) {
        if self.held {
            debug!("Wake lock released");
            self.held = false;
        }
    }
}

/// Logs the notification a desktop shell would render
#[derive(Debug, Default)]
pub struct DesktopForeground {
    visible: bool,
}

impl ForegroundHost for DesktopForeground {
    fn update(&mut self, snapshot: &SessionSnapshot, now_playing: Option<&NowPlaying>) {
        if !self.visible {
            info!("Entering foreground");
            self.visible = true;
        }
        match now_playing {
            Some(np) => debug!(
                "Notification: {} [{}] {}/{}",
                np.track.title,
                snapshot.status,
                np.queue_index + 1,
                np.queue_len
            ),
            None => debug!("Notification: [{}]", snapshot.status),
        }
    }

    fn exit(&mut self) {
        if self.visible {
            info!("Leaving foreground");
            self.visible = false;
        }
    }
}

/// Route monitor for hosts without route change reporting
#[derive(Debug, Default)]
pub struct NoRouteMonitor;

impl RouteMonitor for NoRouteMonitor {
    fn register(&mut self, _mailbox: Mailbox) {}

    fn unregister(&mut self) {}
}
