use std::collections::HashMap;

use crate::graph::{GraphError, TransitionGraph};
use crate::key::HarmonicKey;
use crate::model::{HotCue, Track, TrackDetails, TrackId, Transition, TransitionType};
use crate::repository::{Result, TrackRecord, TrackRepository, TransitionRecord};

/// What the loader had to drop or fold to build a consistent graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Transitions citing a track that was not loaded.
    pub skipped_transitions: usize,
    /// Tracks folded into an earlier track with the same (title, artist).
    pub merged_tracks: usize,
    pub invalid_tracks: usize,
    pub invalid_transitions: usize,
    /// Transitions that collided on the same ordered pair after merging.
    pub duplicate_transitions: usize,
    /// Tracks kept without a key because the stored key did not parse.
    pub unparsed_keys: usize,
}

pub struct LoadResult {
    pub graph: TransitionGraph,
    pub report: LoadReport,
}

/// Read everything from `repo` and build a graph from it.
pub fn load_graph<R: TrackRepository + ?Sized>(repo: &R) -> Result<LoadResult> {
    let tracks = repo.list_tracks()?;
    let transitions = repo.list_transitions()?;
    let result = build_graph(&tracks, &transitions);
    log::info!(
        "Loaded {} tracks and {} transitions ({} skipped, {} merged)",
        result.graph.track_count(),
        result.graph.transition_count(),
        result.report.skipped_transitions,
        result.report.merged_tracks
    );
    Ok(result)
}

/// Build a graph from raw records.
///
/// Bad rows never abort the load: a transition with a dangling endpoint is
/// skipped and counted, a track that fails validation is dropped, and
/// tracks sharing (title, artist) collapse onto the first id seen, with
/// transitions remapped to it.
pub fn build_graph(tracks: &[TrackRecord], transitions: &[TransitionRecord]) -> LoadResult {
    let mut graph = TransitionGraph::new();
    let mut report = LoadReport::default();

    // stored id -> canonical id
    let mut canonical: HashMap<TrackId, TrackId> = HashMap::new();
    let mut by_identity: HashMap<(String, String), TrackId> = HashMap::new();

    for record in tracks {
        let identity = (record.title.clone(), record.artist.clone());
        if let Some(&first) = by_identity.get(&identity) {
            log::debug!(
                "Track {} duplicates \"{}\" by {}; using id {}",
                record.id, record.title, record.artist, first
            );
            canonical.insert(record.id, first);
            report.merged_tracks += 1;
            continue;
        }

        let track = match to_track(record, &mut report) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Skipping track {}: {}", record.id, e);
                report.invalid_tracks += 1;
                continue;
            }
        };

        match graph.add_track(track) {
            Ok(()) => {
                canonical.insert(record.id, record.id);
                by_identity.insert(identity, record.id);
            }
            Err(e) => {
                log::warn!("Skipping track {}: {}", record.id, e);
                report.invalid_tracks += 1;
            }
        }
    }

    for record in transitions {
        let (Some(&from), Some(&to)) = (
            canonical.get(&record.from_track_id),
            canonical.get(&record.to_track_id),
        ) else {
            log::warn!(
                "Skipping transition {}: {} -> {} references a missing track",
                record.id, record.from_track_id, record.to_track_id
            );
            report.skipped_transitions += 1;
            continue;
        };

        let transition = match to_transition(record) {
            Ok(t) => t.remapped(from, to),
            Err(e) => {
                log::warn!("Skipping transition {}: {}", record.id, e);
                report.invalid_transitions += 1;
                continue;
            }
        };

        match graph.add_transition(transition) {
            Ok(()) => {}
            Err(GraphError::DuplicateTransition { from, to }) => {
                log::debug!("Transition {} duplicates {} -> {}; keeping the first", record.id, from, to);
                report.duplicate_transitions += 1;
            }
            Err(e) => {
                log::warn!("Skipping transition {}: {}", record.id, e);
                report.skipped_transitions += 1;
            }
        }
    }

    LoadResult { graph, report }
}

fn to_track(record: &TrackRecord, report: &mut LoadReport) -> std::result::Result<Track, crate::model::ModelError> {
    let key = match record.key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(raw) => match raw.parse::<HarmonicKey>() {
            Ok(k) => Some(k),
            Err(e) => {
                log::debug!("Track {}: {}", record.id, e);
                report.unparsed_keys += 1;
                None
            }
        },
        None => None,
    };

    Track::new(
        record.id,
        record.title.clone(),
        record.artist.clone(),
        TrackDetails {
            bpm: record.bpm,
            key,
            duration_seconds: record.duration_seconds,
            genre: record.genre.clone(),
            location: record.location.clone(),
        },
    )
}

fn to_transition(record: &TransitionRecord) -> std::result::Result<Transition, crate::model::ModelError> {
    let transition_type: TransitionType = record.transition_type.parse()?;
    let cue = |raw: &Option<String>| -> std::result::Result<Option<HotCue>, crate::model::ModelError> {
        match raw.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => Ok(Some(c.parse()?)),
            None => Ok(None),
        }
    };

    let mut transition = Transition::new(
        record.from_track_id,
        record.to_track_id,
        record.rating,
        transition_type,
    )?
    .with_id(record.id)
    .with_cues(cue(&record.mix_out_cue)?, cue(&record.mix_in_cue)?);
    if let Some(notes) = &record.notes {
        transition = transition.with_notes(notes.clone());
    }
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn track(id: TrackId, title: &str, artist: &str) -> TrackRecord {
        TrackRecord {
            id,
            title: title.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dangling_transition_skipped() {
        let tracks = vec![track(1, "I Love It", "Icona Pop"), track(2, "Party Rock Anthem", "LMFAO")];
        let transitions = vec![
            TransitionRecord::new(1, 1, 2, 5, "blend"),
            TransitionRecord::new(2, 2, 99, 5, "drop_swap"),
        ];

        let LoadResult { graph, report } = build_graph(&tracks, &transitions);
        assert_eq!(graph.track_count(), 2);
        assert_eq!(graph.transition_count(), 1);
        assert!(graph.transition(1, 2).is_some());
        assert_eq!(report.skipped_transitions, 1);
    }

    #[test]
    fn test_duplicate_identity_merged_and_remapped() {
        let tracks = vec![
            track(1, "Danza Kuduro", "Don Omar"),
            track(2, "Gangnam Style", "PSY"),
            track(3, "Danza Kuduro", "Don Omar"),
            track(4, "danza kuduro", "Don Omar"), // identity is case-sensitive
        ];
        let transitions = vec![
            TransitionRecord::new(10, 2, 3, 4, "blend"),
            TransitionRecord::new(11, 3, 2, 2, "echo_out"),
        ];

        let LoadResult { graph, report } = build_graph(&tracks, &transitions);
        assert_eq!(report.merged_tracks, 1);
        assert_eq!(graph.track_count(), 3);
        assert!(!graph.contains_track(3));
        assert_eq!(graph.transition(2, 1).unwrap().id(), Some(10));
        assert_eq!(graph.transition(1, 2).unwrap().id(), Some(11));
        assert_eq!(report.skipped_transitions, 0);
    }

    #[test]
    fn test_remap_collision_keeps_first() {
        let tracks = vec![
            track(1, "A", "x"),
            track(2, "B", "x"),
            track(3, "A", "x"),
        ];
        let transitions = vec![
            TransitionRecord::new(1, 1, 2, 3, "blend"),
            TransitionRecord::new(2, 3, 2, 5, "loop"),
        ];
        let LoadResult { graph, report } = build_graph(&tracks, &transitions);
        assert_eq!(graph.transition_count(), 1);
        assert_eq!(graph.transition(1, 2).unwrap().rating(), 3);
        assert_eq!(report.duplicate_transitions, 1);
    }

    #[test]
    fn test_invalid_rows_skipped() {
        let mut with_neg_bpm = track(3, "C", "x");
        with_neg_bpm.bpm = Some(-1.0);
        let tracks = vec![track(1, "A", "x"), track(2, "", "x"), with_neg_bpm];
        let transitions = vec![
            TransitionRecord::new(1, 1, 1, 9, "blend"),
            TransitionRecord::new(2, 1, 1, 3, "scratch"),
            TransitionRecord::new(3, 1, 2, 3, "blend"),
        ];

        let LoadResult { graph, report } = build_graph(&tracks, &transitions);
        assert_eq!(graph.track_count(), 1);
        assert_eq!(report.invalid_tracks, 2);
        assert_eq!(report.invalid_transitions, 2);
        // Track 2 never made it in, so its edge dangles.
        assert_eq!(report.skipped_transitions, 1);
        assert_eq!(graph.transition_count(), 0);
    }

    #[test]
    fn test_keys_and_cues_resolved() {
        let mut a = track(1, "A", "x");
        a.key = Some("8a".into());
        let mut b = track(2, "B", "x");
        b.key = Some("N/A".into());
        let mut t = TransitionRecord::new(5, 1, 2, 4, "wordplay");
        t.mix_out_cue = Some("c".into());
        t.mix_in_cue = Some(String::new());
        t.notes = Some("lyrics line up".into());

        let LoadResult { graph, report } = build_graph(&[a, b], &[t]);
        assert_eq!(graph.track(1).unwrap().key().unwrap().to_string(), "8A");
        assert!(graph.track(2).unwrap().key().is_none());
        assert_eq!(report.unparsed_keys, 1);

        let edge = graph.transition(1, 2).unwrap();
        assert_eq!(edge.transition_type(), TransitionType::Wordplay);
        assert_eq!(edge.mix_out_cue(), Some(HotCue::C));
        assert_eq!(edge.mix_in_cue(), None);
        assert_eq!(edge.notes(), Some("lyrics line up"));
    }

    #[test]
    fn test_load_from_repository() {
        let mut repo = MemoryRepository::new();
        repo.push_track(track(1, "A", "x"));
        repo.push_track(track(2, "B", "x"));
        repo.push_transition(TransitionRecord::new(1, 1, 2, 3, "blend"));
        repo.push_transition(TransitionRecord::new(2, 1, 3, 3, "blend"));

        let LoadResult { graph, report } = load_graph(&repo).unwrap();
        assert_eq!(graph.transition_count(), 1);
        assert_eq!(report, LoadReport { skipped_transitions: 1, ..Default::default() });
    }
}
