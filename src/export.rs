use serde::{Deserialize, Serialize};

use crate::graph::TransitionGraph;
use crate::key::HarmonicKey;
use crate::model::{Track, TrackId, Transition, TransitionId, TransitionType};
use crate::subset::Subgraph;

/// Graph snapshot for visualization tooling: `{nodes: [...], edges: [...]}`.
///
/// Field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub key: Option<HarmonicKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub id: TransitionId,
    #[serde(rename = "fromId")]
    pub from_id: TrackId,
    #[serde(rename = "toId")]
    pub to_id: TrackId,
    pub rating: u8,
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &TransitionGraph) -> Self {
        Self::build(graph, graph.all_tracks(), graph.all_transitions())
    }

    pub fn from_subgraph(sub: &Subgraph<'_>) -> Self {
        Self::build(sub.parent(), sub.nodes.iter().copied(), sub.edges.iter().copied())
    }

    fn build<'a>(
        graph: &TransitionGraph,
        tracks: impl IntoIterator<Item = &'a Track>,
        transitions: impl IntoIterator<Item = &'a Transition>,
    ) -> Self {
        let nodes = tracks
            .into_iter()
            .map(|t| NodeView {
                id: t.id(),
                title: t.title().to_string(),
                artist: t.artist().to_string(),
                bpm: t.bpm(),
                key: t.key(),
            })
            .collect();

        // Edges built in memory have no storage id. They are numbered after
        // the highest stored id by their insertion sequence in the full graph.
        let max_stored = graph.all_transitions().iter().filter_map(|t| t.id()).max().unwrap_or(0);
        let edges = transitions
            .into_iter()
            .map(|t| EdgeView {
                id: t.id().unwrap_or_else(|| {
                    let seq = graph.sequence(t.from(), t.to()).unwrap_or(0);
                    max_stored + seq as TransitionId + 1
                }),
                from_id: t.from(),
                to_id: t.to(),
                rating: t.rating(),
                transition_type: t.transition_type(),
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
