use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::HarmonicKey;

/// Surrogate id assigned by the owning repository.
pub type TrackId = i64;
pub type TransitionId = i64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid track: {0}")]
    InvalidTrack(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// A track in the library. Validated on construction; fields are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: TrackId,
    title: String,
    artist: String,
    bpm: Option<f64>,
    key: Option<HarmonicKey>,
    duration_seconds: Option<u32>,
    genre: Option<String>,
    location: Option<String>,
}

/// Optional track attributes, so `Track::new` stays readable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackDetails {
    pub bpm: Option<f64>,
    pub key: Option<HarmonicKey>,
    pub duration_seconds: Option<i64>,
    pub genre: Option<String>,
    pub location: Option<String>,
}

impl Track {
    pub fn new(
        id: TrackId,
        title: impl Into<String>,
        artist: impl Into<String>,
        details: TrackDetails,
    ) -> Result<Self, ModelError> {
        let title = title.into();
        let artist = artist.into();

        if id <= 0 {
            return Err(ModelError::InvalidTrack(format!("id must be positive, got {id}")));
        }
        if title.trim().is_empty() {
            return Err(ModelError::InvalidTrack(format!("track {id} has an empty title")));
        }
        if artist.trim().is_empty() {
            return Err(ModelError::InvalidTrack(format!("\"{title}\" has an empty artist")));
        }
        if let Some(bpm) = details.bpm {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(ModelError::InvalidTrack(format!("\"{title}\" has bpm {bpm}")));
            }
        }
        let duration_seconds = match details.duration_seconds {
            Some(d) => Some(u32::try_from(d).map_err(|_| {
                ModelError::InvalidTrack(format!("\"{title}\" has duration {d}s"))
            })?),
            None => None,
        };

        Ok(Self {
            id,
            title,
            artist,
            bpm: details.bpm,
            key: details.key,
            duration_seconds,
            genre: details.genre.filter(|g| !g.is_empty()),
            location: details.location.filter(|l| !l.is_empty()),
        })
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    pub fn key(&self) -> Option<HarmonicKey> {
        self.key
    }

    pub fn duration_seconds(&self) -> Option<u32> {
        self.duration_seconds
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Whether this track's key mixes with `other`'s. `None` if either key is unknown.
    pub fn key_matches(&self, other: &Track) -> Option<bool> {
        Some(self.key?.is_compatible(&other.key?))
    }

    /// Case-sensitive (title, artist) identity used for deduplication.
    pub fn identity(&self) -> (&str, &str) {
        (&self.title, &self.artist)
    }
}

/// How the DJ moves from one track into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Blend,
    EchoOut,
    DropSwap,
    Wordplay,
    Loop,
}

impl TransitionType {
    pub const ALL: [TransitionType; 5] = [
        Self::Blend,
        Self::EchoOut,
        Self::DropSwap,
        Self::Wordplay,
        Self::Loop,
    ];

    /// Storage / wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blend => "blend",
            Self::EchoOut => "echo_out",
            Self::DropSwap => "drop_swap",
            Self::Wordplay => "wordplay",
            Self::Loop => "loop",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized || t.as_str().replace('_', "") == normalized)
            .ok_or_else(|| ModelError::InvalidTransition(format!("unknown transition type {s:?}")))
    }
}

/// One of the ten hot-cue slots on a deck (A-J).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotCue {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl HotCue {
    const ALL: [HotCue; 10] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
    ];

    pub fn letter(&self) -> char {
        (b'A' + *self as u8) as char
    }
}

impl fmt::Display for HotCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for HotCue {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::ALL
                .into_iter()
                .find(|cue| cue.letter() == c.to_ascii_uppercase()),
            _ => None,
        }
        .ok_or_else(|| ModelError::InvalidTransition(format!("unknown hot cue {s:?}")))
    }
}

/// A directed, rated recommendation for mixing `from` into `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    id: Option<TransitionId>,
    from: TrackId,
    to: TrackId,
    rating: u8,
    transition_type: TransitionType,
    notes: Option<String>,
    mix_out_cue: Option<HotCue>,
    mix_in_cue: Option<HotCue>,
}

impl Transition {
    pub const MIN_RATING: i64 = 1;
    pub const MAX_RATING: i64 = 5;

    pub fn new(
        from: TrackId,
        to: TrackId,
        rating: i64,
        transition_type: TransitionType,
    ) -> Result<Self, ModelError> {
        if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&rating) {
            return Err(ModelError::InvalidTransition(format!(
                "rating for {from} -> {to} must be 1-5, got {rating}"
            )));
        }
        Ok(Self {
            id: None,
            from,
            to,
            rating: rating as u8,
            transition_type,
            notes: None,
            mix_out_cue: None,
            mix_in_cue: None,
        })
    }

    /// Attach the storage id this transition was loaded under.
    pub fn with_id(mut self, id: TransitionId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
        self
    }

    pub fn with_cues(mut self, mix_out: Option<HotCue>, mix_in: Option<HotCue>) -> Self {
        self.mix_out_cue = mix_out;
        self.mix_in_cue = mix_in;
        self
    }

    /// Same transition with its endpoints rewritten (used when merging duplicate tracks).
    pub(crate) fn remapped(mut self, from: TrackId, to: TrackId) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn id(&self) -> Option<TransitionId> {
        self.id
    }

    pub fn from(&self) -> TrackId {
        self.from
    }

    pub fn to(&self) -> TrackId {
        self.to
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn mix_out_cue(&self) -> Option<HotCue> {
        self.mix_out_cue
    }

    pub fn mix_in_cue(&self) -> Option<HotCue> {
        self.mix_in_cue
    }

    pub fn stars(&self) -> String {
        "★".repeat(self.rating as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_requires_title_and_artist() {
        assert!(Track::new(1, "Levels", "Avicii", TrackDetails::default()).is_ok());
        assert!(matches!(
            Track::new(1, "", "Avicii", TrackDetails::default()),
            Err(ModelError::InvalidTrack(_))
        ));
        assert!(matches!(
            Track::new(1, "Levels", "  ", TrackDetails::default()),
            Err(ModelError::InvalidTrack(_))
        ));
    }

    #[test]
    fn test_track_rejects_bad_numbers() {
        let neg_bpm = TrackDetails { bpm: Some(-128.0), ..Default::default() };
        assert!(Track::new(1, "A", "B", neg_bpm).is_err());

        let nan_bpm = TrackDetails { bpm: Some(f64::NAN), ..Default::default() };
        assert!(Track::new(1, "A", "B", nan_bpm).is_err());

        let neg_duration = TrackDetails { duration_seconds: Some(-1), ..Default::default() };
        assert!(Track::new(1, "A", "B", neg_duration).is_err());

        assert!(Track::new(0, "A", "B", TrackDetails::default()).is_err());
        assert!(Track::new(-3, "A", "B", TrackDetails::default()).is_err());
    }

    #[test]
    fn test_track_keeps_details() {
        let details = TrackDetails {
            bpm: Some(126.0),
            key: Some("3B".parse().unwrap()),
            duration_seconds: Some(0),
            genre: Some(String::new()),
            location: Some("/music/i_love_it.mp3".into()),
        };
        let t = Track::new(7, "I Love It", "Icona Pop", details).unwrap();
        assert_eq!(t.bpm(), Some(126.0));
        assert_eq!(t.key().unwrap().to_string(), "3B");
        assert_eq!(t.duration_seconds(), Some(0));
        assert_eq!(t.genre(), None);
        assert_eq!(t.location(), Some("/music/i_love_it.mp3"));
        assert_eq!(t.identity(), ("I Love It", "Icona Pop"));
    }

    #[test]
    fn test_key_matches() {
        let with_key = |id, k: &str| {
            Track::new(id, "t", "a", TrackDetails { key: Some(k.parse().unwrap()), ..Default::default() })
                .unwrap()
        };
        assert_eq!(with_key(1, "8A").key_matches(&with_key(2, "9A")), Some(true));
        assert_eq!(with_key(1, "8A").key_matches(&with_key(2, "10B")), Some(false));
        let no_key = Track::new(3, "t", "a", TrackDetails::default()).unwrap();
        assert_eq!(with_key(1, "8A").key_matches(&no_key), None);
    }

    #[test]
    fn test_transition_rating_bounds() {
        for rating in 1..=5 {
            assert!(Transition::new(1, 2, rating, TransitionType::Blend).is_ok());
        }
        assert!(matches!(
            Transition::new(1, 2, 0, TransitionType::Blend),
            Err(ModelError::InvalidTransition(_))
        ));
        assert!(matches!(
            Transition::new(1, 2, 6, TransitionType::Loop),
            Err(ModelError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_transition_builders() {
        let t = Transition::new(1, 2, 4, TransitionType::EchoOut)
            .unwrap()
            .with_id(9)
            .with_notes("  ")
            .with_cues(Some(HotCue::C), Some(HotCue::A));
        assert_eq!(t.id(), Some(9));
        assert_eq!(t.notes(), None);
        assert_eq!(t.mix_out_cue(), Some(HotCue::C));
        assert_eq!(t.mix_in_cue(), Some(HotCue::A));
        assert_eq!(t.stars(), "★★★★");

        let t = t.with_notes("filter sweep on the outro");
        assert_eq!(t.notes(), Some("filter sweep on the outro"));
    }

    #[test]
    fn test_transition_type_names() {
        assert_eq!("echo_out".parse::<TransitionType>().unwrap(), TransitionType::EchoOut);
        assert_eq!("Drop Swap".parse::<TransitionType>().unwrap(), TransitionType::DropSwap);
        assert_eq!("dropswap".parse::<TransitionType>().unwrap(), TransitionType::DropSwap);
        assert_eq!("LOOP".parse::<TransitionType>().unwrap(), TransitionType::Loop);
        assert!("scratch".parse::<TransitionType>().is_err());
        for t in TransitionType::ALL {
            assert_eq!(t.to_string().parse::<TransitionType>().unwrap(), t);
        }
    }

    #[test]
    fn test_hot_cue_letters() {
        assert_eq!(HotCue::A.letter(), 'A');
        assert_eq!(HotCue::J.letter(), 'J');
        assert_eq!("d".parse::<HotCue>().unwrap(), HotCue::D);
        assert!("K".parse::<HotCue>().is_err());
        assert!("AB".parse::<HotCue>().is_err());
    }
}
