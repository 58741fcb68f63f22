use crate::import::ImportedTrack;
use crate::key::HarmonicKey;
use crate::model::TrackId;

/// Data for inserting a track.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub duration_seconds: Option<i64>,
    pub genre: Option<String>,
    pub location: Option<String>,
}

impl NewTrack {
    /// Reject rows that could never load as a track.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("empty title");
        }
        if self.artist.trim().is_empty() {
            return Err("empty artist");
        }
        if self.bpm.is_some_and(|b| !b.is_finite() || b <= 0.0) {
            return Err("bpm must be positive");
        }
        if self.duration_seconds.is_some_and(|d| d < 0) {
            return Err("negative duration");
        }
        Ok(())
    }
}

impl From<ImportedTrack> for NewTrack {
    fn from(t: ImportedTrack) -> Self {
        Self {
            title: t.title,
            artist: t.artist,
            bpm: t.bpm,
            // Store recognised keys in Camelot form; keep anything else verbatim.
            key: t.key.map(|k| k.parse::<HarmonicKey>().map_or(k, |h| h.to_string())),
            duration_seconds: t.duration_seconds,
            genre: t.genre,
            location: t.location,
        }
    }
}

/// Data for inserting a transition. Validate through
/// [`crate::model::Transition::new`] first; the table only checks the rating.
#[derive(Debug, Clone)]
pub struct NewTransition {
    pub from_track_id: TrackId,
    pub to_track_id: TrackId,
    pub rating: i64,
    pub transition_type: String,
    pub notes: Option<String>,
    pub mix_out_cue: Option<String>,
    pub mix_in_cue: Option<String>,
}

impl From<&crate::model::Transition> for NewTransition {
    fn from(t: &crate::model::Transition) -> Self {
        Self {
            from_track_id: t.from(),
            to_track_id: t.to(),
            rating: i64::from(t.rating()),
            transition_type: t.transition_type().as_str().to_string(),
            notes: t.notes().map(str::to_string),
            mix_out_cue: t.mix_out_cue().map(|c| c.to_string()),
            mix_in_cue: t.mix_in_cue().map(|c| c.to_string()),
        }
    }
}

/// A transition joined with both track titles, for listings.
#[derive(Debug, Clone)]
pub struct TransitionListing {
    pub id: i64,
    pub from_track_id: TrackId,
    pub from_title: String,
    pub to_track_id: TrackId,
    pub to_title: String,
    pub to_artist: String,
    pub rating: i64,
    pub transition_type: String,
    pub notes: Option<String>,
}

/// Result of storing a parsed export.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_in_file: usize,
    pub inserted: usize,
    pub existing: usize,
    pub invalid: usize,
    /// Tracks newly placed in the target folder (0 without a folder).
    pub added_to_folder: usize,
}

/// Library statistics.
#[derive(Debug)]
pub struct LibraryStats {
    pub total_tracks: i64,
    pub total_transitions: i64,
    pub folders: i64,
    pub playlists: i64,
    pub tracks_without_key: i64,
    pub avg_rating: Option<f64>,
    pub transition_types: Vec<(String, i64)>,
}
