use thiserror::Error;

use crate::graph::{GraphError, TransitionGraph};
use crate::model::{Track, TrackId, Transition};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("No track titled \"{0}\"")]
    NoMatch(String),
    #[error("Invalid selection {position}: choose 1-{available}")]
    InvalidSelection { position: usize, available: usize },
    #[error("No track selected yet")]
    NotPositioned,
    #[error("Session already ended")]
    Ended,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, NavError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    AwaitingStart,
    Positioned,
    Ended,
}

/// One entry of the ranked choice list. `position` is 1-based, as displayed.
#[derive(Debug, Clone, Copy)]
pub struct RankedTransition<'g> {
    pub position: usize,
    pub transition: &'g Transition,
    pub destination: &'g Track,
}

/// Result of handling one line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum NavOutcome<'g> {
    /// Moved to a new current track (start, selection or jump).
    Moved(&'g Track),
    History(Vec<&'g Track>),
    Ended,
    Ignored,
}

/// Walks a [`TransitionGraph`] one track at a time.
///
/// Invalid input never changes state; the caller reports the error and
/// prompts again.
pub struct Navigator<'g> {
    graph: &'g TransitionGraph,
    history: Vec<&'g Track>,
    ended: bool,
}

impl<'g> Navigator<'g> {
    pub fn new(graph: &'g TransitionGraph) -> Self {
        Self { graph, history: Vec::new(), ended: false }
    }

    pub fn graph(&self) -> &'g TransitionGraph {
        self.graph
    }

    pub fn state(&self) -> NavState {
        if self.ended {
            NavState::Ended
        } else if self.history.is_empty() {
            NavState::AwaitingStart
        } else {
            NavState::Positioned
        }
    }

    pub fn current(&self) -> Option<&'g Track> {
        self.history.last().copied()
    }

    /// Visited tracks, oldest first, starting with the first selection.
    pub fn history(&self) -> &[&'g Track] {
        &self.history
    }

    pub fn history_titles(&self) -> Vec<&'g str> {
        self.history.iter().map(|t| t.title()).collect()
    }

    /// Pick the starting track by title.
    pub fn start(&mut self, title: &str) -> Result<&'g Track> {
        match self.state() {
            NavState::Ended => Err(NavError::Ended),
            NavState::AwaitingStart | NavState::Positioned => self.jump(title),
        }
    }

    /// Outgoing transitions of the current track, best rated first.
    /// Equal ratings keep the graph's insertion order.
    pub fn ranked_transitions(&self) -> Result<Vec<RankedTransition<'g>>> {
        let current = self.positioned()?;
        let mut edges = self.graph.outgoing_transitions(current.id())?;
        edges.sort_by(|a, b| b.rating().cmp(&a.rating()));

        edges
            .into_iter()
            .enumerate()
            .map(|(i, transition)| {
                let destination = self.track(transition.to())?;
                Ok(RankedTransition { position: i + 1, transition, destination })
            })
            .collect()
    }

    /// Follow the ranked transition at 1-based `position`.
    pub fn select(&mut self, position: usize) -> Result<&'g Track> {
        let ranked = self.ranked_transitions()?;
        let chosen = position
            .checked_sub(1)
            .and_then(|i| ranked.get(i))
            .ok_or(NavError::InvalidSelection { position, available: ranked.len() })?;
        let destination = chosen.destination;
        self.history.push(destination);
        Ok(destination)
    }

    /// Move to a track by title whether or not an edge leads there.
    ///
    /// Titles are matched case-insensitively. When several tracks share a
    /// title the first one in library order wins.
    pub fn jump(&mut self, title: &str) -> Result<&'g Track> {
        if self.ended {
            return Err(NavError::Ended);
        }
        let matches = self.graph.tracks_titled(title);
        let Some(&track) = matches.first() else {
            return Err(NavError::NoMatch(title.trim().to_string()));
        };
        if matches.len() > 1 {
            log::warn!(
                "{} tracks titled \"{}\"; using the one by {}",
                matches.len(),
                track.title(),
                track.artist()
            );
        }
        self.history.push(track);
        Ok(track)
    }

    pub fn quit(&mut self) {
        self.ended = true;
    }

    /// Interpret one line of input.
    ///
    /// `q`/`quit` ends, `h`/`history` shows history, a number selects a
    /// ranked transition and anything else is treated as a title. A leading
    /// `=` forces the rest to be read as a title, so tracks named "Quit" or
    /// "22" stay reachable.
    pub fn handle(&mut self, line: &str) -> Result<NavOutcome<'g>> {
        if self.ended {
            return Err(NavError::Ended);
        }
        let input = line.trim();
        if let Some(title) = input.strip_prefix('=') {
            return self.start(title).map(NavOutcome::Moved);
        }
        match input.to_lowercase().as_str() {
            "" => return Ok(NavOutcome::Ignored),
            "q" | "quit" | "exit" => {
                self.quit();
                return Ok(NavOutcome::Ended);
            }
            "h" | "history" => return Ok(NavOutcome::History(self.history.clone())),
            _ => {}
        }

        if self.state() == NavState::Positioned {
            if let Ok(position) = input.parse::<usize>() {
                return match self.select(position) {
                    // A track may literally be titled "22".
                    Err(NavError::InvalidSelection { .. }) if !self.graph.tracks_titled(input).is_empty() => {
                        self.jump(input).map(NavOutcome::Moved)
                    }
                    other => other.map(NavOutcome::Moved),
                };
            }
        }
        self.start(input).map(NavOutcome::Moved)
    }

    fn positioned(&self) -> Result<&'g Track> {
        if self.ended {
            return Err(NavError::Ended);
        }
        self.current().ok_or(NavError::NotPositioned)
    }

    fn track(&self, id: TrackId) -> Result<&'g Track> {
        self.graph.track(id).ok_or(NavError::Graph(GraphError::UnknownTrack(id)))
    }
}
