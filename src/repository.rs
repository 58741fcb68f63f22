use std::collections::HashMap;

use thiserror::Error;

use crate::collection::{Collection, CollectionEntry, CollectionError, CollectionRef};
use crate::model::{TrackId, TransitionId};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("Unknown {0}")]
    UnknownCollection(CollectionRef),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// A track as stored: unvalidated, key still a string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub duration_seconds: Option<i64>,
    pub genre: Option<String>,
    pub location: Option<String>,
}

/// A transition as stored: ids not yet resolved, type and cues still strings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub id: TransitionId,
    pub from_track_id: TrackId,
    pub to_track_id: TrackId,
    pub rating: i64,
    pub transition_type: String,
    pub notes: Option<String>,
    pub mix_out_cue: Option<String>,
    pub mix_in_cue: Option<String>,
}

impl TransitionRecord {
    pub fn new(id: TransitionId, from: TrackId, to: TrackId, rating: i64, transition_type: &str) -> Self {
        Self {
            id,
            from_track_id: from,
            to_track_id: to,
            rating,
            transition_type: transition_type.to_string(),
            notes: None,
            mix_out_cue: None,
            mix_in_cue: None,
        }
    }
}

/// Durable source of tracks, transitions and collection membership.
pub trait TrackRepository {
    fn list_tracks(&self) -> Result<Vec<TrackRecord>>;

    fn list_transitions(&self) -> Result<Vec<TransitionRecord>>;

    /// Membership rows of a folder or playlist, ordered by position.
    fn list_collection_entries(&self, collection: CollectionRef) -> Result<Vec<CollectionEntry>>;

    fn list_collection_track_ids(&self, collection: CollectionRef) -> Result<Vec<TrackId>> {
        Ok(self
            .list_collection_entries(collection)?
            .into_iter()
            .map(|e| e.track_id)
            .collect())
    }
}

/// Repository held entirely in memory. Useful for tests and for loading
/// data that never touched the database (e.g. a parsed export).
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tracks: Vec<TrackRecord>,
    transitions: Vec<TransitionRecord>,
    collections: HashMap<CollectionRef, Collection>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_track(&mut self, record: TrackRecord) {
        self.tracks.push(record);
    }

    pub fn push_transition(&mut self, record: TransitionRecord) {
        self.transitions.push(record);
    }

    /// Add a track to a folder or playlist, creating the collection on first use.
    pub fn add_to_collection(&mut self, collection: CollectionRef, track_id: TrackId) -> Result<i64> {
        let c = self
            .collections
            .entry(collection)
            .or_insert_with(|| Collection::new(collection));
        Ok(c.add(track_id)?)
    }
}

impl TrackRepository for MemoryRepository {
    fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.tracks.clone())
    }

    fn list_transitions(&self) -> Result<Vec<TransitionRecord>> {
        Ok(self.transitions.clone())
    }

    fn list_collection_entries(&self, collection: CollectionRef) -> Result<Vec<CollectionEntry>> {
        self.collections
            .get(&collection)
            .map(|c| c.entries().to_vec())
            .ok_or(RepositoryError::UnknownCollection(collection))
    }
}
