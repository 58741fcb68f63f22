use std::collections::HashSet;

use crate::collection::{CollectionEntry, CollectionRef};
use crate::graph::TransitionGraph;
use crate::model::{Track, TrackId, Transition};
use crate::repository::{Result, TrackRepository};

/// The part of a graph induced by a folder or playlist.
///
/// Nodes are unique by track id: a playlist that repeats a track yields one
/// node, placed at the track's first position.
#[derive(Debug, Clone)]
pub struct Subgraph<'g> {
    pub nodes: Vec<&'g Track>,
    pub edges: Vec<&'g Transition>,
    graph: &'g TransitionGraph,
}

impl<'g> Subgraph<'g> {
    /// Restrict `graph` to the members of a collection.
    ///
    /// Nodes follow collection position (ties broken by title). Edges are
    /// those whose source and destination are both members, in graph order.
    /// Members missing from the graph are ignored.
    pub fn induced(graph: &'g TransitionGraph, entries: &[CollectionEntry]) -> Self {
        let mut ordered: Vec<(i64, &'g Track)> = Vec::new();
        let mut members: HashSet<TrackId> = HashSet::new();

        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|e| e.position);
        for entry in &sorted {
            let Some(track) = graph.track(entry.track_id) else {
                log::debug!("Member {} is not in the graph", entry.track_id);
                continue;
            };
            if members.insert(track.id()) {
                ordered.push((entry.position, track));
            }
        }
        ordered.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| a.title().cmp(b.title())));

        let edges = graph
            .all_transitions()
            .into_iter()
            .filter(|t| members.contains(&t.from()) && members.contains(&t.to()))
            .collect();

        Self {
            nodes: ordered.into_iter().map(|(_, t)| t).collect(),
            edges,
            graph,
        }
    }

    /// The full graph this was cut from.
    pub fn parent(&self) -> &'g TransitionGraph {
        self.graph
    }

    /// An owned graph with just these nodes and edges, e.g. to navigate a single folder.
    pub fn to_graph(&self) -> TransitionGraph {
        let mut graph = TransitionGraph::new();
        for track in &self.nodes {
            if let Err(e) = graph.add_track((*track).clone()) {
                log::warn!("Subgraph node skipped: {e}");
            }
        }
        for edge in &self.edges {
            if let Err(e) = graph.add_transition((*edge).clone()) {
                log::warn!("Subgraph edge skipped: {e}");
            }
        }
        graph
    }
}

/// Fetch a collection's membership from `repo` and restrict `graph` to it.
pub fn collection_subgraph<'g, R: TrackRepository + ?Sized>(
    repo: &R,
    graph: &'g TransitionGraph,
    collection: CollectionRef,
) -> Result<Subgraph<'g>> {
    let entries = repo.list_collection_entries(collection)?;
    Ok(Subgraph::induced(graph, &entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TrackDetails, TransitionType};
    use crate::repository::MemoryRepository;

    fn graph() -> TransitionGraph {
        let mut g = TransitionGraph::new();
        for (id, title) in [(1, "One"), (2, "Two"), (3, "Three")] {
            g.add_track(Track::new(id, title, "x", TrackDetails::default()).unwrap()).unwrap();
        }
        for (from, to) in [(1, 2), (2, 3), (1, 3)] {
            g.add_transition(Transition::new(from, to, 3, TransitionType::Blend).unwrap()).unwrap();
        }
        g
    }

    fn ids(sub: &Subgraph) -> Vec<TrackId> {
        sub.nodes.iter().map(|t| t.id()).collect()
    }

    fn pairs(sub: &Subgraph) -> Vec<(TrackId, TrackId)> {
        sub.edges.iter().map(|t| (t.from(), t.to())).collect()
    }

    #[test]
    fn test_folder_subgraph() {
        let g = graph();
        let mut repo = MemoryRepository::new();
        let folder = CollectionRef::Folder(1);
        repo.add_to_collection(folder, 1).unwrap();
        repo.add_to_collection(folder, 3).unwrap();

        let sub = collection_subgraph(&repo, &g, folder).unwrap();
        assert_eq!(ids(&sub), vec![1, 3]);
        assert_eq!(pairs(&sub), vec![(1, 3)]);
    }

    #[test]
    fn test_nodes_follow_collection_position() {
        let g = graph();
        let entries = [
            CollectionEntry { position: 2, track_id: 1 },
            CollectionEntry { position: 1, track_id: 3 },
            CollectionEntry { position: 3, track_id: 2 },
        ];
        let sub = Subgraph::induced(&g, &entries);
        assert_eq!(ids(&sub), vec![3, 1, 2]);
        assert_eq!(pairs(&sub), vec![(1, 2), (2, 3), (1, 3)]);
    }

    #[test]
    fn test_equal_positions_sort_by_title() {
        let g = graph();
        let entries = [
            CollectionEntry { position: 0, track_id: 2 },
            CollectionEntry { position: 0, track_id: 1 },
        ];
        let sub = Subgraph::induced(&g, &entries);
        assert_eq!(ids(&sub), vec![1, 2]); // "One" < "Two"
    }

    #[test]
    fn test_playlist_repeats_collapse() {
        let g = graph();
        let mut repo = MemoryRepository::new();
        let playlist = CollectionRef::Playlist(7);
        for id in [2, 1, 2, 99] {
            repo.add_to_collection(playlist, id).unwrap();
        }
        let sub = collection_subgraph(&repo, &g, playlist).unwrap();
        assert_eq!(ids(&sub), vec![2, 1]);
        assert_eq!(pairs(&sub), vec![(1, 2)]);
    }

    #[test]
    fn test_to_graph_navigable() {
        let g = graph();
        let entries = [
            CollectionEntry { position: 1, track_id: 1 },
            CollectionEntry { position: 2, track_id: 2 },
        ];
        let owned = Subgraph::induced(&g, &entries).to_graph();
        assert_eq!(owned.track_count(), 2);
        assert_eq!(owned.transition_count(), 1);
        assert!(owned.transition(1, 2).is_some());
    }

    #[test]
    fn test_empty_collection() {
        let g = graph();
        let sub = Subgraph::induced(&g, &[]);
        assert!(sub.nodes.is_empty());
        assert!(sub.edges.is_empty());
    }
}
