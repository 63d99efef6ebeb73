//! Metadata store
//!
//! In-memory, multi-index projection of the track catalog: one id→track map
//! plus grouped ordered multisets keyed by album, artist and playlist.
//!
//! A store is built off the session actor and then published as an
//! `Arc<MetadataStore>`. Nothing mutates a published store; reloads and row
//! changes produce a new one.

use crate::catalog::source::{CatalogRows, TrackDelta};
use lyre_common::{AlbumId, ArtistId, PlaylistId, Track, TrackId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Ordering used inside one grouped index
pub type TrackOrder = fn(&Track, &Track) -> Ordering;

/// Library and artist order: title key, then id for a total order
pub fn by_title_key(a: &Track, b: &Track) -> Ordering {
    a.title_key.cmp(&b.title_key).then(a.id.cmp(&b.id))
}

/// Album order: disc, then track number
pub fn by_disc_and_track(a: &Track, b: &Track) -> Ordering {
    (a.disc_number, a.track_number)
        .cmp(&(b.disc_number, b.track_number))
        .then_with(|| by_title_key(a, b))
}

/// Grouped ordered multiset keyed by a catalog id
///
/// Members of a group are kept sorted by the index's comparator. Equal
/// members keep insertion order.
#[derive(Debug, Clone)]
pub struct GroupedIndex<K> {
    groups: HashMap<K, Vec<Arc<Track>>>,
    order: TrackOrder,
}

impl<K: Copy + Eq + Hash> GroupedIndex<K> {
    pub fn new(order: TrackOrder) -> Self {
        Self {
            groups: HashMap::new(),
            order,
        }
    }

    pub fn insert(&mut self, key: K, track: Arc<Track>) {
        let order = self.order;
        let group = self.groups.entry(key).or_default();
        let pos = group.partition_point(|t| order(t, &track) != Ordering::Greater);
        group.insert(pos, track);
    }

    /// Members of one group in index order; empty for unknown keys
    pub fn get(&self, key: &K) -> &[Arc<Track>] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove every occurrence of a track, returning the keys it was under
    pub fn remove_track(&mut self, id: TrackId) -> Vec<K> {
        let mut keys = Vec::new();
        for (key, group) in self.groups.iter_mut() {
            let before = group.len();
            group.retain(|t| t.id != id);
            for _ in group.len()..before {
                keys.push(*key);
            }
        }
        self.groups.retain(|_, group| !group.is_empty());
        keys
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Group a track can be filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Album(AlbumId),
    Artist(ArtistId),
    Playlist(PlaylistId),
}

/// Multi-index projection of the catalog
#[derive(Debug, Clone)]
pub struct MetadataStore {
    tracks: HashMap<TrackId, Arc<Track>>,
    by_album: GroupedIndex<AlbumId>,
    by_artist: GroupedIndex<ArtistId>,
    // TODO: switch to the user-assigned playlist position once playlist rows
    // carry it through `CatalogRows`; title order matches current behavior.
    by_playlist: GroupedIndex<PlaylistId>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
            by_album: GroupedIndex::new(by_disc_and_track),
            by_artist: GroupedIndex::new(by_title_key),
            by_playlist: GroupedIndex::new(by_title_key),
        }
    }

    /// Build a store from a full catalog load
    pub fn from_rows(rows: CatalogRows) -> Self {
        let mut store = Self::new();
        for track in rows.tracks {
            store.insert(track);
        }
        for (playlist_id, track_id) in rows.playlist_members {
            if let Some(track) = store.tracks.get(&track_id).cloned() {
                store.by_playlist.insert(playlist_id, track);
            }
        }
        store
    }

    /// File a track under `key`
    ///
    /// The track always lands in the global map and in its own album and
    /// artist groups; a playlist key adds a playlist membership on top.
    pub fn put(&mut self, key: GroupKey, track: Track) {
        let track = self.insert(track);
        if let GroupKey::Playlist(playlist_id) = key {
            self.by_playlist.insert(playlist_id, track);
        }
    }

    /// Insert or replace a track in the global map and its album/artist
    /// groups, keeping existing playlist memberships
    pub fn insert(&mut self, track: Track) -> Arc<Track> {
        if let Some(existing) = self.tracks.get(&track.id) {
            if **existing == track {
                return Arc::clone(existing);
            }
        }

        let playlists = self.remove(track.id);
        let track = Arc::new(track);
        self.tracks.insert(track.id, Arc::clone(&track));
        self.by_album.insert(track.album_id, Arc::clone(&track));
        self.by_artist.insert(track.artist_id, Arc::clone(&track));
        for playlist_id in playlists {
            self.by_playlist.insert(playlist_id, Arc::clone(&track));
        }
        track
    }

    /// Remove a track from every index, returning its playlist memberships
    pub fn remove(&mut self, id: TrackId) -> Vec<PlaylistId> {
        if self.tracks.remove(&id).is_none() {
            return Vec::new();
        }
        self.by_album.remove_track(id);
        self.by_artist.remove_track(id);
        self.by_playlist.remove_track(id)
    }

    /// Members of a group in group order; empty for unknown keys
    pub fn get(&self, key: GroupKey) -> Vec<Arc<Track>> {
        match key {
            GroupKey::Album(id) => self.by_album.get(&id).to_vec(),
            GroupKey::Artist(id) => self.by_artist.get(&id).to_vec(),
            GroupKey::Playlist(id) => self.by_playlist.get(&id).to_vec(),
        }
    }

    pub fn track(&self, id: TrackId) -> Option<Arc<Track>> {
        self.tracks.get(&id).cloned()
    }

    /// Whole library in title-key order
    pub fn all_tracks(&self) -> Vec<Arc<Track>> {
        let mut tracks: Vec<Arc<Track>> = self.tracks.values().cloned().collect();
        tracks.sort_by(|a, b| by_title_key(a, b));
        tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drop all indices
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.by_album.clear();
        self.by_artist.clear();
        self.by_playlist.clear();
    }

    /// Copy of this store with one targeted row change applied
    pub fn with_delta(&self, delta: TrackDelta) -> Self {
        let mut next = self.clone();
        match delta {
            TrackDelta::Upsert { track, playlists } => {
                let track = next.insert(track);
                // Row deltas carry the full membership list
                next.by_playlist.remove_track(track.id);
                for playlist_id in playlists {
                    next.by_playlist.insert(playlist_id, Arc::clone(&track));
                }
            }
            TrackDelta::Removed(id) => {
                next.remove(id);
            }
        }
        next
    }
}
