//! Persisted cross-restart session state
//!
//! The last played selector, the last played track and the shuffle flag are
//! kept in the `settings` key/value table so the queue can be rebuilt after a
//! restart.

use crate::error::{Error, Result};
use lyre_common::{Selector, TrackId};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const LAST_SELECTOR: &str = "last_selector";
const LAST_TRACK_ID: &str = "last_track_id";
const SHUFFLE_MODE: &str = "shuffle_mode";

/// Session state that survives a restart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub last_selector: Option<Selector>,
    pub last_track_id: Option<TrackId>,
    pub shuffle: bool,
}

/// Receives session state changes from the coordinator
///
/// `save` must not block; implementations hand the write off.
pub trait SessionStateSink: Send {
    fn save(&mut self, state: &PersistedSession);
}

/// Load persisted state; missing keys fall back to defaults
pub async fn load(db: &Pool<Sqlite>) -> Result<PersistedSession> {
    let last_selector = get_setting::<Selector>(db, LAST_SELECTOR).await?;
    let last_track_id = get_setting::<i64>(db, LAST_TRACK_ID).await?.map(TrackId);
    let shuffle = get_setting::<bool>(db, SHUFFLE_MODE).await?.unwrap_or(false);

    Ok(PersistedSession {
        last_selector,
        last_track_id,
        shuffle,
    })
}

pub async fn save(db: &Pool<Sqlite>, state: &PersistedSession) -> Result<()> {
    match state.last_selector {
        Some(selector) => set_setting(db, LAST_SELECTOR, selector).await?,
        None => delete_setting(db, LAST_SELECTOR).await?,
    }
    match state.last_track_id {
        Some(id) => set_setting(db, LAST_TRACK_ID, id.0).await?,
        None => delete_setting(db, LAST_TRACK_ID).await?,
    }
    set_setting(db, SHUFFLE_MODE, state.shuffle).await
}

/// Writes session state on a background task, in the order it was saved
pub struct SessionStateWriter {
    tx: mpsc::UnboundedSender<PersistedSession>,
}

impl SessionStateWriter {
    pub fn spawn(db: Pool<Sqlite>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistedSession>();
        let handle = tokio::spawn(async move {
            while let Some(mut state) = rx.recv().await {
                // Only the newest pending state matters
                while let Ok(newer) = rx.try_recv() {
                    state = newer;
                }
                if let Err(e) = save(&db, &state).await {
                    warn!("Failed to persist session state: {}", e);
                }
            }
            debug!("Session state writer finished");
        });
        (Self { tx }, handle)
    }
}

impl SessionStateSink for SessionStateWriter {
    fn save(&mut self, state: &PersistedSession) {
        if self.tx.send(state.clone()).is_err() {
            warn!("Session state writer is gone; state not persisted");
        }
    }
}

async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}
