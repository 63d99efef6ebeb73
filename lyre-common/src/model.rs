//! Catalog model types
//!
//! Tracks are immutable once loaded; a catalog reload replaces them wholesale
//! and a targeted row change replaces a single one.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

catalog_id!(
    /// Catalog row id of a track
    TrackId
);
catalog_id!(
    /// Catalog id of an album
    AlbumId
);
catalog_id!(
    /// Catalog id of an artist
    ArtistId
);
catalog_id!(
    /// Id of a user playlist
    PlaylistId
);

/// One catalog track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    /// Collation key used for title ordering
    pub title_key: String,
    pub album_id: AlbumId,
    pub artist_id: ArtistId,
    pub duration_ms: u64,
    pub disc_number: u32,
    pub track_number: u32,
    /// Opaque reference to cover art, resolved by renderers
    pub art_ref: Option<String>,
    /// Source locator handed to the playback resource (file path or URI)
    pub source: String,
}

impl Track {
    /// Build the title collation key for a display title.
    ///
    /// Case-folds, drops a leading English article and ignores punctuation so
    /// "The Wall" sorts with "Wall" and "(Intro)" with "Intro".
    pub fn title_key_for(title: &str) -> String {
        let folded = title.trim().to_lowercase();
        let stripped = ["the ", "a ", "an "]
            .iter()
            .find_map(|article| folded.strip_prefix(article))
            .unwrap_or(&folded);

        stripped
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Category tag used to request a materialized queue
///
/// String form: `ALL_TRACKS`, `ALBUM:<id>`, `ARTIST:<id>`, `PLAYLIST:<id>`,
/// `DAILY:<id>` (the daily id is the track of the day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    AllTracks,
    Album(AlbumId),
    Artist(ArtistId),
    Playlist(PlaylistId),
    Daily(TrackId),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::AllTracks => write!(f, "ALL_TRACKS"),
            Selector::Album(id) => write!(f, "ALBUM:{}", id),
            Selector::Artist(id) => write!(f, "ARTIST:{}", id),
            Selector::Playlist(id) => write!(f, "PLAYLIST:{}", id),
            Selector::Daily(id) => write!(f, "DAILY:{}", id),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "ALL_TRACKS" {
            return Ok(Selector::AllTracks);
        }

        let (category, key) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidSelector(s.to_string()))?;
        let key: i64 = key
            .trim()
            .parse()
            .map_err(|_| Error::InvalidSelector(s.to_string()))?;

        match category {
            "ALBUM" => Ok(Selector::Album(AlbumId(key))),
            "ARTIST" => Ok(Selector::Artist(ArtistId(key))),
            "PLAYLIST" => Ok(Selector::Playlist(PlaylistId(key))),
            "DAILY" => Ok(Selector::Daily(TrackId(key))),
            _ => Err(Error::InvalidSelector(s.to_string())),
        }
    }
}

impl TryFrom<String> for Selector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}
