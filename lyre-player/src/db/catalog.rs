//! SQLite catalog collaborator
//!
//! Reads the `tracks` and `playlist_tracks` tables. A failed read (missing
//! table, unreadable file) is reported as `Error::CatalogUnavailable`.

use crate::catalog::source::{CatalogRows, CatalogSource, TrackDelta};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use lyre_common::{AlbumId, ArtistId, PlaylistId, Track, TrackId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

const TRACK_COLUMNS: &str = "id, title, title_key, album_id, artist_id, duration_ms, \
                             disc_number, track_number, art_ref, source";

/// Catalog backed by the session database
#[derive(Clone)]
pub struct SqliteCatalog {
    db: Pool<Sqlite>,
}

impl SqliteCatalog {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn fetch_catalog(&self) -> Result<CatalogRows> {
        let tracks = sqlx::query(&format!("SELECT {} FROM tracks", TRACK_COLUMNS))
            .fetch_all(&self.db)
            .await
            .map_err(unavailable)?
            .iter()
            .map(track_from_row)
            .collect::<Vec<_>>();

        let playlist_members = sqlx::query("SELECT playlist_id, track_id FROM playlist_tracks")
            .fetch_all(&self.db)
            .await
            .map_err(unavailable)?
            .iter()
            .map(|row| {
                (
                    PlaylistId(row.get::<i64, _>("playlist_id")),
                    TrackId(row.get::<i64, _>("track_id")),
                )
            })
            .collect();

        debug!("Read {} track rows from catalog", tracks.len());
        Ok(CatalogRows {
            tracks,
            playlist_members,
        })
    }

    async fn fetch_row(&self, id: TrackId) -> Result<TrackDelta> {
        let row = sqlx::query(&format!("SELECT {} FROM tracks WHERE id = ?", TRACK_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.db)
            .await
            .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(TrackDelta::Removed(id));
        };

        let playlists = sqlx::query_scalar::<_, i64>(
            "SELECT playlist_id FROM playlist_tracks WHERE track_id = ? ORDER BY playlist_id",
        )
        .bind(id.0)
        .fetch_all(&self.db)
        .await
        .map_err(unavailable)?
        .into_iter()
        .map(PlaylistId)
        .collect();

        Ok(TrackDelta::Upsert {
            track: track_from_row(&row),
            playlists,
        })
    }
}

impl CatalogSource for SqliteCatalog {
    fn load_catalog(&self) -> BoxFuture<'_, Result<CatalogRows>> {
        Box::pin(self.fetch_catalog())
    }

    fn load_row(&self, id: TrackId) -> BoxFuture<'_, Result<TrackDelta>> {
        Box::pin(self.fetch_row(id))
    }
}

fn unavailable(e: sqlx::Error) -> Error {
    Error::CatalogUnavailable(e.to_string())
}

fn track_from_row(row: &SqliteRow) -> Track {
    let title: String = row.get("title");
    let stored_key: String = row.get("title_key");
    let title_key = if stored_key.is_empty() {
        Track::title_key_for(&title)
    } else {
        stored_key
    };

    Track {
        id: TrackId(row.get("id")),
        title,
        title_key,
        album_id: AlbumId(row.get("album_id")),
        artist_id: ArtistId(row.get("artist_id")),
        duration_ms: row.get::<i64, _>("duration_ms").max(0) as u64,
        disc_number: row.get::<i64, _>("disc_number").max(0) as u32,
        track_number: row.get::<i64, _>("track_number").max(0) as u32,
        art_ref: row.get("art_ref"),
        source: row.get("source"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();

        sqlx::query(
            r#"
            INSERT INTO tracks (id, title, title_key, album_id, artist_id, duration_ms,
                                disc_number, track_number, art_ref, source)
            VALUES (1, 'The Wall', '', 10, 20, 180000, 1, 2, NULL, '/music/wall.flac'),
                   (2, 'Anthem', 'anthem', 10, 20, 200000, 1, 1, 'art/10.jpg', '/music/anthem.flac')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("INSERT INTO playlist_tracks (playlist_id, track_id) VALUES (5, 1), (6, 1), (5, 2)")
            .execute(&pool)
            .await
            .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_load_catalog_reads_all_rows() {
        let catalog = SqliteCatalog::new(setup_test_db().await);
        let rows = catalog.load_catalog().await.unwrap();

        assert_eq!(rows.tracks.len(), 2);
        assert_eq!(rows.playlist_members.len(), 3);

        let wall = rows.tracks.iter().find(|t| t.id == TrackId(1)).unwrap();
        assert_eq!(wall.title_key, "wall");
        assert_eq!(wall.track_number, 2);
        assert_eq!(wall.art_ref, None);

        let anthem = rows.tracks.iter().find(|t| t.id == TrackId(2)).unwrap();
        assert_eq!(anthem.art_ref.as_deref(), Some("art/10.jpg"));
    }

    #[tokio::test]
    async fn test_load_row_upsert_and_removed() {
        let catalog = SqliteCatalog::new(setup_test_db().await);

        match catalog.load_row(TrackId(1)).await.unwrap() {
            TrackDelta::Upsert { track, playlists } => {
                assert_eq!(track.title, "The Wall");
                assert_eq!(playlists, vec![PlaylistId(5), PlaylistId(6)]);
            }
            other => panic!("expected upsert, got {:?}", other),
        }

        assert_eq!(
            catalog.load_row(TrackId(99)).await.unwrap(),
            TrackDelta::Removed(TrackId(99))
        );
    }

    #[tokio::test]
    async fn test_missing_tables_reported_as_unavailable() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let catalog = SqliteCatalog::new(pool);

        match catalog.load_catalog().await {
            Err(Error::CatalogUnavailable(_)) => {}
            other => panic!("expected CatalogUnavailable, got {:?}", other.map(|r| r.tracks.len())),
        }
    }
}
