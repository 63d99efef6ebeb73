//! Queue engine
//!
//! Materializes an ordered play queue from a selector, navigates it and
//! reorders it.
//!
//! Entries are snapshots: each holds an `Arc<Track>` taken from the store at
//! build time, so a later catalog reload cannot change a queue in flight.
//! Entry ids are assigned 1, 2, 3, ... in build order and are only unique
//! within one build.

use crate::catalog::store::{GroupKey, MetadataStore};
use lyre_common::events::EntryId;
use lyre_common::{Selector, Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// One occurrence of a track in a queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub entry_id: EntryId,
    pub track: Arc<Track>,
}

/// Navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Result of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub index: usize,
    /// Set when `Next` ran past the last entry and wrapped to 0
    pub end_of_queue: bool,
}

/// Lookup key for `index_of`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRef {
    Entry(EntryId),
    Track(TrackId),
}

/// Ordered queue plus current index
///
/// `current` is always within `[0, len)` while the queue is non-empty and is
/// never read while it is empty.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    entries: Vec<QueueEntry>,
    current: usize,
    selector: Option<Selector>,
}

impl Queue {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Selector this queue was built from
    pub fn selector(&self) -> Option<Selector> {
        self.selector
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.entries.get(self.current)
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    /// Move the current index; rejected when out of bounds
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Move one entry to the head, keeping it current
    pub fn move_to_front(&mut self, entry_id: EntryId) {
        if let Some(pos) = self.entries.iter().position(|e| e.entry_id == entry_id) {
            let entry = self.entries.remove(pos);
            self.entries.insert(0, entry);
            self.current = 0;
        }
    }

    /// Apply a reordering and re-resolve the current index by entry identity
    fn reorder(&mut self, apply: impl FnOnce(&mut Vec<QueueEntry>)) {
        let current_id = self.current().map(|e| e.entry_id);
        apply(&mut self.entries);
        self.current = current_id
            .and_then(|id| self.entries.iter().position(|e| e.entry_id == id))
            .unwrap_or(0);
    }
}

/// Materialize a queue for `selector`
///
/// Ordering is deterministic: the library by title key, an album by
/// (disc, track), an artist or playlist by title key, and a daily selector
/// yields its single track. Unknown keys yield an empty queue.
pub fn build_queue(selector: Selector, store: &MetadataStore) -> Queue {
    let tracks = match selector {
        Selector::AllTracks => store.all_tracks(),
        Selector::Album(id) => store.get(GroupKey::Album(id)),
        Selector::Artist(id) => store.get(GroupKey::Artist(id)),
        Selector::Playlist(id) => store.get(GroupKey::Playlist(id)),
        Selector::Daily(id) => store.track(id).into_iter().collect(),
    };

    let entries = tracks
        .into_iter()
        .enumerate()
        .map(|(i, track)| QueueEntry {
            entry_id: EntryId(i as u64 + 1),
            track,
        })
        .collect();

    Queue {
        entries,
        current: 0,
        selector: Some(selector),
    }
}

/// Step from `index` in `direction`
///
/// `Previous` stops at 0. `Next` from the last entry wraps to 0 and sets
/// `end_of_queue`; what to do about it is the caller's decision. Returns
/// `None` for an empty queue.
pub fn navigate(queue: &Queue, index: usize, direction: Direction) -> Option<Navigation> {
    let len = queue.len();
    if len == 0 {
        return None;
    }
    let index = index.min(len - 1);

    let nav = match direction {
        Direction::Previous => Navigation {
            index: index.saturating_sub(1),
            end_of_queue: false,
        },
        Direction::Next if index + 1 >= len => Navigation {
            index: 0,
            end_of_queue: true,
        },
        Direction::Next => Navigation {
            index: index + 1,
            end_of_queue: false,
        },
    };
    Some(nav)
}

/// Position of an entry (by entry id) or of the first occurrence of a track
pub fn index_of(queue: &Queue, target: EntryRef) -> Option<usize> {
    queue.entries.iter().position(|e| match target {
        EntryRef::Entry(id) => e.entry_id == id,
        EntryRef::Track(id) => e.track.id == id,
    })
}

/// Shuffle in place; the current entry stays current
pub fn shuffle<R: Rng + ?Sized>(queue: &mut Queue, rng: &mut R) {
    queue.reorder(|entries| entries.shuffle(rng));
}

/// Restore build order in place; the current entry stays current
pub fn sort_to_build_order(queue: &mut Queue) {
    queue.reorder(|entries| entries.sort_by_key(|e| e.entry_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::source::CatalogRows;
    use lyre_common::{AlbumId, ArtistId, PlaylistId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(id: i64, title: &str, album: i64, disc: u32, number: u32) -> Track {
        Track {
            id: TrackId(id),
            title: title.to_string(),
            title_key: Track::title_key_for(title),
            album_id: AlbumId(album),
            artist_id: ArtistId(1),
            duration_ms: 200_000,
            disc_number: disc,
            track_number: number,
            art_ref: None,
            source: format!("/music/{}.ogg", id),
        }
    }

    fn store() -> MetadataStore {
        MetadataStore::from_rows(CatalogRows {
            tracks: vec![
                track(1, "Delta", 10, 1, 2),
                track(2, "Bravo", 10, 1, 1),
                track(3, "Alpha", 10, 2, 1),
                track(4, "Charlie", 11, 1, 1),
                track(5, "Echo", 11, 1, 2),
            ],
            playlist_members: vec![(PlaylistId(7), TrackId(5)), (PlaylistId(7), TrackId(2))],
        })
    }

    fn track_ids(queue: &Queue) -> Vec<i64> {
        queue.entries().iter().map(|e| e.track.id.0).collect()
    }

    fn entry_ids(queue: &Queue) -> Vec<u64> {
        queue.entries().iter().map(|e| e.entry_id.0).collect()
    }

    #[test]
    fn test_library_queue_sorted_by_title() {
        let queue = build_queue(Selector::AllTracks, &store());
        assert_eq!(track_ids(&queue), vec![3, 2, 4, 1, 5]);
        assert_eq!(entry_ids(&queue), vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.selector(), Some(Selector::AllTracks));
    }

    #[test]
    fn test_album_queue_sorted_by_disc_and_track() {
        let queue = build_queue(Selector::Album(AlbumId(10)), &store());
        assert_eq!(track_ids(&queue), vec![2, 1, 3]);
    }

    #[test]
    fn test_playlist_queue_sorted_by_title() {
        let queue = build_queue(Selector::Playlist(PlaylistId(7)), &store());
        assert_eq!(track_ids(&queue), vec![2, 5]);
    }

    #[test]
    fn test_daily_queue_has_one_entry() {
        let queue = build_queue(Selector::Daily(TrackId(4)), &store());
        assert_eq!(track_ids(&queue), vec![4]);

        let missing = build_queue(Selector::Daily(TrackId(404)), &store());
        assert!(missing.is_empty());
        assert_eq!(missing.current_index(), None);
    }

    #[test]
    fn test_unknown_selector_key_yields_empty_queue() {
        let queue = build_queue(Selector::Artist(ArtistId(99)), &store());
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_previous_never_goes_below_zero() {
        let queue = build_queue(Selector::AllTracks, &store());
        for i in 0..queue.len() {
            let nav = navigate(&queue, i, Direction::Previous).unwrap();
            assert_eq!(nav.index, i.saturating_sub(1));
            assert!(!nav.end_of_queue);
        }
        assert_eq!(navigate(&queue, 0, Direction::Previous).unwrap().index, 0);
    }

    #[test]
    fn test_next_wraps_and_signals_end_of_queue() {
        let queue = build_queue(Selector::AllTracks, &store());
        let last = queue.len() - 1;

        let nav = navigate(&queue, last, Direction::Next).unwrap();
        assert_eq!(nav, Navigation { index: 0, end_of_queue: true });

        let nav = navigate(&queue, 1, Direction::Next).unwrap();
        assert_eq!(nav, Navigation { index: 2, end_of_queue: false });
    }

    #[test]
    fn test_single_entry_queue_next_wraps_to_itself() {
        let queue = build_queue(Selector::Daily(TrackId(1)), &store());
        let nav = navigate(&queue, 0, Direction::Next).unwrap();
        assert_eq!(nav, Navigation { index: 0, end_of_queue: true });
    }

    #[test]
    fn test_navigate_empty_queue_is_impossible() {
        assert_eq!(navigate(&Queue::empty(), 0, Direction::Next), None);
        assert_eq!(navigate(&Queue::empty(), 0, Direction::Previous), None);
    }

    #[test]
    fn test_index_of_by_entry_and_track() {
        let queue = build_queue(Selector::AllTracks, &store());
        assert_eq!(index_of(&queue, EntryRef::Entry(EntryId(3))), Some(2));
        assert_eq!(index_of(&queue, EntryRef::Track(TrackId(5))), Some(4));
        assert_eq!(index_of(&queue, EntryRef::Entry(EntryId(42))), None);
        assert_eq!(index_of(&queue, EntryRef::Track(TrackId(42))), None);
    }

    #[test]
    fn test_shuffle_then_sort_restores_build_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = build_queue(Selector::AllTracks, &store());
        let canonical = entry_ids(&queue);

        shuffle(&mut queue, &mut rng);
        let mut shuffled = entry_ids(&queue);
        shuffled.sort();
        assert_eq!(shuffled, canonical);

        sort_to_build_order(&mut queue);
        assert_eq!(entry_ids(&queue), canonical);
    }

    #[test]
    fn test_shuffle_keeps_current_entry_by_identity() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut queue = build_queue(Selector::AllTracks, &store());
        assert!(queue.set_current(3));
        let current = queue.current().unwrap().entry_id;

        for _ in 0..5 {
            shuffle(&mut queue, &mut rng);
            assert_eq!(queue.current().unwrap().entry_id, current);
        }

        sort_to_build_order(&mut queue);
        assert_eq!(queue.current_index(), Some(3));
    }

    #[test]
    fn test_set_current_rejects_out_of_bounds() {
        let mut queue = build_queue(Selector::Album(AlbumId(10)), &store());
        assert!(!queue.set_current(3));
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_move_to_front() {
        let mut queue = build_queue(Selector::AllTracks, &store());
        queue.move_to_front(EntryId(4));
        assert_eq!(entry_ids(&queue), vec![4, 1, 2, 3, 5]);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_entries_are_snapshots() {
        let original = store();
        let queue = build_queue(Selector::Daily(TrackId(1)), &original);

        let mut renamed = track(1, "Renamed", 10, 1, 2);
        renamed.source = "/elsewhere.ogg".to_string();
        let reloaded = original.with_delta(crate::catalog::source::TrackDelta::Upsert {
            track: renamed,
            playlists: vec![],
        });

        assert_eq!(reloaded.track(TrackId(1)).unwrap().title, "Renamed");
        assert_eq!(queue.current().unwrap().track.title, "Delta");
    }
}
