//! Transport handle
//!
//! Cloneable front door to a running session. Commands are posted to the
//! coordinator's inbox and applied asynchronously; state is read back from
//! the shared snapshot or the event stream.

use crate::catalog::source::CatalogService;
use crate::error::{Error, Result};
use crate::playback::messages::{Command, FocusEvent, Mailbox, PlayExtras, SessionMessage};
use crate::state::SharedState;
use lyre_common::events::{EntryId, NowPlaying, SessionEvent, SessionSnapshot};
use lyre_common::{Selector, TrackId};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct SessionHandle {
    mailbox: Mailbox,
    state: Arc<SharedState>,
    catalog: Option<CatalogService>,
}

impl SessionHandle {
    pub fn new(mailbox: Mailbox, state: Arc<SharedState>, catalog: Option<CatalogService>) -> Self {
        Self {
            mailbox,
            state,
            catalog,
        }
    }

    fn post(&self, message: SessionMessage) -> Result<()> {
        if self.mailbox.post(message) {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.post(SessionMessage::Command(command))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.send(Command::SeekTo(position_ms))
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.send(Command::SkipToNext)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.send(Command::SkipToPrevious)
    }

    pub fn skip_to_queue_entry(&self, entry_id: EntryId) -> Result<()> {
        self.send(Command::SkipToQueueEntry(entry_id))
    }

    pub fn play_from_selector(&self, selector: Selector, extras: PlayExtras) -> Result<()> {
        self.send(Command::PlayFromSelector { selector, extras })
    }

    pub fn set_shuffle_mode(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetShuffleMode(enabled))
    }

    /// Release everything and end the session actor
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Report a host audio-focus change
    pub fn focus_changed(&self, event: FocusEvent) -> Result<()> {
        self.post(SessionMessage::Focus(event))
    }

    /// Refresh one catalog row in the background
    pub fn catalog_row_changed(&self, id: TrackId) -> Result<()> {
        if self.mailbox.is_closed() {
            return Err(Error::SessionClosed);
        }
        match &self.catalog {
            Some(catalog) => {
                catalog.spawn_row_refresh(id);
                Ok(())
            }
            None => Err(Error::CatalogUnavailable("no catalog source attached".to_string())),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.get_snapshot().await
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        self.state.get_now_playing().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.subscribe_events()
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_are_posted_in_order() {
        let (mailbox, mut rx) = Mailbox::channel();
        let handle = SessionHandle::new(mailbox, Arc::new(SharedState::new(8)), None);

        handle.play().unwrap();
        handle.seek_to(1500).unwrap();
        handle.focus_changed(FocusEvent::Lost).unwrap();

        assert!(matches!(rx.recv().await, Some(SessionMessage::Command(Command::Play))));
        assert!(matches!(
            rx.recv().await,
            Some(SessionMessage::Command(Command::SeekTo(1500)))
        ));
        assert!(matches!(rx.recv().await, Some(SessionMessage::Focus(FocusEvent::Lost))));
    }

    #[tokio::test]
    async fn test_closed_session_is_reported() {
        let (mailbox, rx) = Mailbox::channel();
        let handle = SessionHandle::new(mailbox, Arc::new(SharedState::new(8)), None);
        drop(rx);

        assert!(matches!(handle.pause(), Err(Error::SessionClosed)));
        assert!(matches!(
            handle.catalog_row_changed(TrackId(1)),
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_row_change_without_catalog() {
        let (mailbox, _rx) = Mailbox::channel();
        let handle = SessionHandle::new(mailbox, Arc::new(SharedState::new(8)), None);
        assert!(matches!(
            handle.catalog_row_changed(TrackId(1)),
            Err(Error::CatalogUnavailable(_))
        ));
    }
}
