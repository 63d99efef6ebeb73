//! Output route monitoring
//!
//! Polls the host's default output device while playback is registered and
//! posts `DecoderEvent::OutputRouteLost` when it disappears or changes
//! (headphones unplugged, Bluetooth sink gone).

use crate::host::RouteMonitor;
use crate::playback::messages::{DecoderEvent, Mailbox};
use cpal::traits::{DeviceTrait, HostTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the current default output device, if any
pub fn default_output_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .map(|device| device.name().unwrap_or_else(|_| "Unknown".to_string()))
}

/// Whether the route playback started on is no longer the active one
pub fn route_lost(baseline: Option<&str>, current: Option<&str>) -> bool {
    match (baseline, current) {
        (Some(_), None) => true,
        (Some(before), Some(now)) => before != now,
        (None, _) => false,
    }
}

/// cpal-backed route monitor running on its own polling thread
pub struct CpalRouteMonitor {
    interval: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl CpalRouteMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }
}

impl RouteMonitor for CpalRouteMonitor {
    fn register(&mut self, mailbox: Mailbox) {
        self.unregister();

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let interval = self.interval;

        let spawned = std::thread::Builder::new()
            .name("lyre-route".to_string())
            .spawn(move || {
                let mut baseline = default_output_name();
                debug!("Watching output route {:?}", baseline);

                while flag.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    if !flag.load(Ordering::Relaxed) {
                        break;
                    }
                    let current = default_output_name();
                    if route_lost(baseline.as_deref(), current.as_deref()) {
                        info!("Output route changed: {:?} -> {:?}", baseline, current);
                        if !mailbox.decoder(DecoderEvent::OutputRouteLost) {
                            break;
                        }
                    }
                    baseline = current;
                }
            });

        match spawned {
            Ok(_) => self.running = Some(running),
            Err(e) => warn!("Failed to start output route monitor: {}", e),
        }
    }

    fn unregister(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::Relaxed);
            debug!("Output route monitor stopped");
        }
    }
}

impl Drop for CpalRouteMonitor {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_lost_when_device_disappears() {
        assert!(route_lost(Some("Headphones"), None));
    }

    #[test]
    fn test_route_lost_when_default_device_changes() {
        assert!(route_lost(Some("Headphones"), Some("Speakers")));
        assert!(!route_lost(Some("Speakers"), Some("Speakers")));
    }

    #[test]
    fn test_no_baseline_never_reports_loss() {
        assert!(!route_lost(None, None));
        assert!(!route_lost(None, Some("Speakers")));
    }
}
