use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Track, TrackId, Transition};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate track id: {0}")]
    DuplicateTrackId(TrackId),
    #[error("Transition {from} -> {to} already exists")]
    DuplicateTransition { from: TrackId, to: TrackId },
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// An edge plus the order it was inserted in, so snapshots are deterministic.
#[derive(Debug, Clone)]
struct Edge {
    seq: u64,
    transition: Transition,
}

/// Tracks as nodes, transitions as directed edges.
///
/// Adjacency is a two-level map `from -> to -> transition`, so there is at
/// most one edge per ordered pair. Every mutation validates first and only
/// then touches state: a rejected call leaves the graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransitionGraph {
    tracks: HashMap<TrackId, Track>,
    order: Vec<TrackId>,
    outgoing: HashMap<TrackId, HashMap<TrackId, Edge>>,
    next_seq: u64,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_track(&mut self, track: Track) -> Result<()> {
        let id = track.id();
        if self.tracks.contains_key(&id) {
            return Err(GraphError::DuplicateTrackId(id));
        }
        self.tracks.insert(id, track);
        self.order.push(id);
        self.outgoing.insert(id, HashMap::new());
        Ok(())
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<()> {
        let (from, to) = (transition.from(), transition.to());
        for id in [from, to] {
            if !self.tracks.contains_key(&id) {
                return Err(GraphError::UnknownTrack(id));
            }
        }
        let edges = self
            .outgoing
            .get_mut(&from)
            .ok_or(GraphError::UnknownTrack(from))?;
        if edges.contains_key(&to) {
            return Err(GraphError::DuplicateTransition { from, to });
        }
        edges.insert(to, Edge { seq: self.next_seq, transition });
        self.next_seq += 1;
        Ok(())
    }

    /// Remove a track and every transition into or out of it.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let track = self.tracks.remove(&id).ok_or(GraphError::UnknownTrack(id))?;
        self.order.retain(|&t| t != id);
        self.outgoing.remove(&id);
        for edges in self.outgoing.values_mut() {
            edges.remove(&id);
        }
        log::debug!("Removed track {} ({}) with its transitions", id, track.title());
        Ok(track)
    }

    /// Remove the edge `from -> to`. `Ok(None)` when both tracks exist but no edge does.
    pub fn remove_transition(&mut self, from: TrackId, to: TrackId) -> Result<Option<Transition>> {
        if !self.tracks.contains_key(&to) {
            return Err(GraphError::UnknownTrack(to));
        }
        let edges = self
            .outgoing
            .get_mut(&from)
            .ok_or(GraphError::UnknownTrack(from))?;
        Ok(edges.remove(&to).map(|e| e.transition))
    }

    /// Every transition leaving `id`, in insertion order. Ranking is left to the caller.
    pub fn outgoing_transitions(&self, id: TrackId) -> Result<Vec<&Transition>> {
        let edges = self.outgoing.get(&id).ok_or(GraphError::UnknownTrack(id))?;
        let mut sorted: Vec<&Edge> = edges.values().collect();
        sorted.sort_by_key(|e| e.seq);
        Ok(sorted.into_iter().map(|e| &e.transition).collect())
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn transition(&self, from: TrackId, to: TrackId) -> Option<&Transition> {
        self.outgoing.get(&from)?.get(&to).map(|e| &e.transition)
    }

    /// Insertion sequence of the edge `from -> to`, starting at 0.
    pub fn sequence(&self, from: TrackId, to: TrackId) -> Option<u64> {
        self.outgoing.get(&from)?.get(&to).map(|e| e.seq)
    }

    pub fn contains_track(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn transition_count(&self) -> usize {
        self.outgoing.values().map(HashMap::len).sum()
    }

    /// Tracks in insertion order.
    pub fn all_tracks(&self) -> Vec<&Track> {
        self.order.iter().filter_map(|id| self.tracks.get(id)).collect()
    }

    /// Transitions in insertion order.
    pub fn all_transitions(&self) -> Vec<&Transition> {
        let mut edges: Vec<&Edge> = self.outgoing.values().flat_map(HashMap::values).collect();
        edges.sort_by_key(|e| e.seq);
        edges.into_iter().map(|e| &e.transition).collect()
    }

    /// Tracks whose title equals `title` ignoring case, in insertion order.
    pub fn tracks_titled(&self, title: &str) -> Vec<&Track> {
        let wanted = title.trim().to_lowercase();
        self.all_tracks()
            .into_iter()
            .filter(|t| t.title().to_lowercase() == wanted)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TrackDetails, TransitionType};

    fn track(id: TrackId, title: &str) -> Track {
        Track::new(id, title, "Artist", TrackDetails::default()).unwrap()
    }

    fn edge(from: TrackId, to: TrackId, rating: i64) -> Transition {
        Transition::new(from, to, rating, TransitionType::Blend).unwrap()
    }

    fn graph_with(ids: &[TrackId]) -> TransitionGraph {
        let mut g = TransitionGraph::new();
        for &id in ids {
            g.add_track(track(id, &format!("Track {id}"))).unwrap();
        }
        g
    }

    fn pairs(edges: &[&Transition]) -> Vec<(TrackId, TrackId)> {
        edges.iter().map(|t| (t.from(), t.to())).collect()
    }

    #[test]
    fn test_duplicate_track_id_rejected() {
        let mut g = graph_with(&[1]);
        let err = g.add_track(track(1, "Impostor")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTrackId(1));
        assert_eq!(g.track_count(), 1);
        assert_eq!(g.track(1).unwrap().title(), "Track 1");
    }

    #[test]
    fn test_transition_to_unknown_track_rejected() {
        let mut g = graph_with(&[1]);
        assert_eq!(g.add_transition(edge(1, 2, 3)), Err(GraphError::UnknownTrack(2)));
        assert_eq!(g.add_transition(edge(5, 1, 3)), Err(GraphError::UnknownTrack(5)));
        assert_eq!(g.transition_count(), 0);
    }

    #[test]
    fn test_duplicate_transition_rejected_not_overwritten() {
        let mut g = graph_with(&[1, 2]);
        g.add_transition(edge(1, 2, 3)).unwrap();
        assert_eq!(
            g.add_transition(edge(1, 2, 5)),
            Err(GraphError::DuplicateTransition { from: 1, to: 2 })
        );
        assert_eq!(g.transition(1, 2).unwrap().rating(), 3);
    }

    #[test]
    fn test_transitions_are_directed() {
        let mut g = graph_with(&[1, 2]);
        g.add_transition(edge(1, 2, 3)).unwrap();
        g.add_transition(edge(2, 1, 4)).unwrap();
        assert_eq!(g.transition_count(), 2);
        assert_eq!(g.transition(2, 1).unwrap().rating(), 4);
    }

    #[test]
    fn test_self_loop_allowed() {
        let mut g = graph_with(&[1]);
        g.add_transition(edge(1, 1, 2)).unwrap();
        assert_eq!(pairs(&g.outgoing_transitions(1).unwrap()), vec![(1, 1)]);
        g.remove_track(1).unwrap();
        assert_eq!(g.transition_count(), 0);
    }

    #[test]
    fn test_remove_track_cascades() {
        let mut g = graph_with(&[1, 2, 3]);
        g.add_transition(edge(1, 2, 3)).unwrap();
        g.add_transition(edge(2, 3, 3)).unwrap();
        g.add_transition(edge(3, 1, 3)).unwrap();

        let removed = g.remove_track(2).unwrap();
        assert_eq!(removed.id(), 2);
        assert_eq!(pairs(&g.all_transitions()), vec![(3, 1)]);
        assert!(!g.contains_track(2));
        assert_eq!(g.outgoing_transitions(2), Err(GraphError::UnknownTrack(2)));
        assert_eq!(g.remove_track(2), Err(GraphError::UnknownTrack(2)));
    }

    #[test]
    fn test_outgoing_unknown_and_empty() {
        let g = graph_with(&[1]);
        assert_eq!(g.outgoing_transitions(42), Err(GraphError::UnknownTrack(42)));
        let first = g.outgoing_transitions(1).unwrap();
        let again = g.outgoing_transitions(1).unwrap();
        assert!(first.is_empty());
        assert!(again.is_empty());
    }

    #[test]
    fn test_outgoing_in_insertion_order() {
        let mut g = graph_with(&[1, 2, 3, 4]);
        g.add_transition(edge(1, 4, 1)).unwrap();
        g.add_transition(edge(1, 2, 5)).unwrap();
        g.add_transition(edge(1, 3, 3)).unwrap();
        assert_eq!(pairs(&g.outgoing_transitions(1).unwrap()), vec![(1, 4), (1, 2), (1, 3)]);
    }

    #[test]
    fn test_snapshots_follow_insertion_order() {
        let mut g = graph_with(&[3, 1, 2]);
        g.add_transition(edge(2, 3, 1)).unwrap();
        g.add_transition(edge(1, 2, 1)).unwrap();
        g.add_transition(edge(3, 1, 1)).unwrap();

        let ids: Vec<TrackId> = g.all_tracks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(pairs(&g.all_transitions()), vec![(2, 3), (1, 2), (3, 1)]);
    }

    #[test]
    fn test_remove_transition() {
        let mut g = graph_with(&[1, 2]);
        g.add_transition(edge(1, 2, 3)).unwrap();
        assert_eq!(g.remove_transition(1, 2).unwrap().unwrap().rating(), 3);
        assert_eq!(g.remove_transition(1, 2), Ok(None));
        assert_eq!(g.remove_transition(1, 9), Err(GraphError::UnknownTrack(9)));
        // Removing frees the pair for a new edge.
        g.add_transition(edge(1, 2, 5)).unwrap();
        assert_eq!(g.transition(1, 2).unwrap().rating(), 5);
    }

    #[test]
    fn test_tracks_titled_ignores_case() {
        let mut g = TransitionGraph::new();
        g.add_track(track(1, "Levels")).unwrap();
        g.add_track(Track::new(2, "LEVELS", "Someone Else", TrackDetails::default()).unwrap())
            .unwrap();
        g.add_track(track(3, "Levels (Skrillex Remix)")).unwrap();

        let ids: Vec<TrackId> = g.tracks_titled(" levels ").iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(g.tracks_titled("lev").is_empty());
    }

    #[test]
    fn test_sequence_survives_removals() {
        let mut g = TransitionGraph::new();
        for id in 1..=3 {
            g.add_track(track(id, "t")).unwrap();
        }
        g.add_transition(edge(1, 2, 3)).unwrap();
        g.add_transition(edge(2, 3, 3)).unwrap();
        g.remove_transition(1, 2).unwrap();
        g.add_transition(edge(3, 1, 3)).unwrap();

        assert_eq!(g.sequence(1, 2), None);
        assert_eq!(g.sequence(2, 3), Some(1));
        assert_eq!(g.sequence(3, 1), Some(2));
    }
}
