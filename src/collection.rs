use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::TrackId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Track {track_id} is already in {collection}")]
    DuplicateMember { collection: CollectionRef, track_id: TrackId },
    #[error("Track {track_id} is not in {collection}")]
    NotAMember { collection: CollectionRef, track_id: TrackId },
    #[error("No entry at position {position} in {collection}")]
    NoSuchPosition { collection: CollectionRef, position: i64 },
}

/// Which collection a membership query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    Folder(i64),
    Playlist(i64),
}

impl CollectionRef {
    pub fn id(&self) -> i64 {
        match self {
            Self::Folder(id) | Self::Playlist(id) => *id,
        }
    }

    /// Folders hold each track at most once; playlists may repeat tracks.
    pub fn allows_repeats(&self) -> bool {
        matches!(self, Self::Playlist(_))
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder(id) => write!(f, "folder {id}"),
            Self::Playlist(id) => write!(f, "playlist {id}"),
        }
    }
}

/// One membership row: a track at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionEntry {
    pub position: i64,
    pub track_id: TrackId,
}

/// Listing metadata for a folder or playlist.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub collection: CollectionRef,
    pub name: String,
    pub parent_id: Option<i64>,
    pub track_count: i64,
    pub created_at: Option<NaiveDateTime>,
}

/// Ordered membership of a folder or playlist.
///
/// Positions start at 1 and new entries go to `max + 1`. Removing an entry
/// leaves a gap rather than renumbering, matching how the store behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    reference: CollectionRef,
    entries: Vec<CollectionEntry>,
}

impl Collection {
    pub fn new(reference: CollectionRef) -> Self {
        Self { reference, entries: Vec::new() }
    }

    /// Rebuild from stored rows. Entries are kept sorted by position.
    pub fn from_entries(reference: CollectionRef, mut entries: Vec<CollectionEntry>) -> Self {
        entries.sort_by_key(|e| e.position);
        Self { reference, entries }
    }

    pub fn reference(&self) -> CollectionRef {
        self.reference
    }

    pub fn entries(&self) -> &[CollectionEntry] {
        &self.entries
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.entries.iter().map(|e| e.track_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.entries.iter().any(|e| e.track_id == track_id)
    }

    pub fn next_position(&self) -> i64 {
        self.entries.iter().map(|e| e.position).max().unwrap_or(0) + 1
    }

    /// Append a track. Returns the position it was given.
    pub fn add(&mut self, track_id: TrackId) -> Result<i64, CollectionError> {
        if !self.reference.allows_repeats() && self.contains(track_id) {
            return Err(CollectionError::DuplicateMember { collection: self.reference, track_id });
        }
        let position = self.next_position();
        self.entries.push(CollectionEntry { position, track_id });
        Ok(position)
    }

    /// Remove every entry for `track_id` (the folder way of removing).
    pub fn remove_track(&mut self, track_id: TrackId) -> Result<(), CollectionError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.track_id != track_id);
        if self.entries.len() == before {
            return Err(CollectionError::NotAMember { collection: self.reference, track_id });
        }
        Ok(())
    }

    /// Remove the entry at `position` (the playlist way of removing).
    pub fn remove_at(&mut self, position: i64) -> Result<TrackId, CollectionError> {
        let idx = self.index_of(position)?;
        Ok(self.entries.remove(idx).track_id)
    }

    /// Swap the tracks at two positions.
    pub fn swap(&mut self, a: i64, b: i64) -> Result<(), CollectionError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        let track_a = self.entries[ia].track_id;
        self.entries[ia].track_id = self.entries[ib].track_id;
        self.entries[ib].track_id = track_a;
        Ok(())
    }

    fn index_of(&self, position: i64) -> Result<usize, CollectionError> {
        self.entries
            .iter()
            .position(|e| e.position == position)
            .ok_or(CollectionError::NoSuchPosition { collection: self.reference, position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_rejects_repeats() {
        let mut folder = Collection::new(CollectionRef::Folder(1));
        assert_eq!(folder.add(10).unwrap(), 1);
        assert_eq!(folder.add(11).unwrap(), 2);
        assert_eq!(
            folder.add(10),
            Err(CollectionError::DuplicateMember { collection: CollectionRef::Folder(1), track_id: 10 })
        );
        assert_eq!(folder.track_ids(), vec![10, 11]);
    }

    #[test]
    fn test_playlist_allows_repeats() {
        let mut playlist = Collection::new(CollectionRef::Playlist(2));
        playlist.add(10).unwrap();
        playlist.add(11).unwrap();
        assert_eq!(playlist.add(10).unwrap(), 3);
        assert_eq!(playlist.track_ids(), vec![10, 11, 10]);
    }

    #[test]
    fn test_remove_at_leaves_gap() {
        let mut playlist = Collection::new(CollectionRef::Playlist(2));
        for id in [10, 11, 12] {
            playlist.add(id).unwrap();
        }
        assert_eq!(playlist.remove_at(2).unwrap(), 11);
        assert_eq!(playlist.track_ids(), vec![10, 12]);
        assert_eq!(playlist.next_position(), 4);
        assert!(matches!(playlist.remove_at(2), Err(CollectionError::NoSuchPosition { .. })));
    }

    #[test]
    fn test_swap_positions() {
        let mut playlist = Collection::new(CollectionRef::Playlist(2));
        for id in [10, 11, 12] {
            playlist.add(id).unwrap();
        }
        playlist.swap(1, 3).unwrap();
        assert_eq!(playlist.track_ids(), vec![12, 11, 10]);
        assert!(playlist.swap(1, 9).is_err());
        assert_eq!(playlist.track_ids(), vec![12, 11, 10]);
    }

    #[test]
    fn test_remove_track_from_folder() {
        let mut folder = Collection::new(CollectionRef::Folder(1));
        folder.add(10).unwrap();
        folder.remove_track(10).unwrap();
        assert!(folder.is_empty());
        assert!(matches!(folder.remove_track(10), Err(CollectionError::NotAMember { .. })));
    }

    #[test]
    fn test_from_entries_sorts_by_position() {
        let c = Collection::from_entries(
            CollectionRef::Folder(1),
            vec![
                CollectionEntry { position: 5, track_id: 3 },
                CollectionEntry { position: 1, track_id: 7 },
            ],
        );
        assert_eq!(c.track_ids(), vec![7, 3]);
        assert_eq!(c.next_position(), 6);
    }
}
