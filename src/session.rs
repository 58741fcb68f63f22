use std::io::BufRead;

use crate::model::{Track, TrackId, TransitionType};
use crate::navigator::{NavError, NavOutcome, NavState, Navigator, RankedTransition};

/// Snapshot of a track for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackView {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
}

impl From<&Track> for TrackView {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id(),
            title: t.title().to_string(),
            artist: t.artist().to_string(),
            bpm: t.bpm(),
            key: t.key().map(|k| k.to_string()),
        }
    }
}

/// One line of the ranked choice list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceView {
    pub position: usize,
    pub title: String,
    pub artist: String,
    pub transition_type: TransitionType,
    pub rating: u8,
    pub stars: String,
    pub notes: Option<String>,
    /// Whether the destination's key mixes with the current track's.
    /// `None` when either key is unknown or key matching is turned off.
    pub key_match: Option<bool>,
}

impl ChoiceView {
    fn new(ranked: &RankedTransition, current: &Track, show_key_match: bool) -> Self {
        let t = ranked.transition;
        Self {
            position: ranked.position,
            title: ranked.destination.title().to_string(),
            artist: ranked.destination.artist().to_string(),
            transition_type: t.transition_type(),
            rating: t.rating(),
            stars: t.stars(),
            notes: t.notes().map(str::to_string),
            key_match: if show_key_match { current.key_matches(ranked.destination) } else { None },
        }
    }
}

/// Receives everything a navigation session wants to show.
pub trait Presenter {
    fn prompt(&mut self, state: NavState);
    fn current(&mut self, track: &TrackView);
    fn choices(&mut self, choices: &[ChoiceView]);
    fn history(&mut self, titles: &[String]);
    /// A recoverable problem with the last input.
    fn notice(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub show_key_match: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { show_key_match: true }
    }
}

/// Drive `nav` from `input` line by line until the user quits or input runs out.
pub fn run<R: BufRead, P: Presenter + ?Sized>(
    nav: &mut Navigator<'_>,
    input: R,
    presenter: &mut P,
    options: SessionOptions,
) -> std::io::Result<()> {
    let mut lines = input.lines();

    while nav.state() != NavState::Ended {
        presenter.prompt(nav.state());
        let Some(line) = lines.next() else {
            nav.quit();
            break;
        };
        let line = line?;

        match nav.handle(&line) {
            Ok(NavOutcome::Moved(track)) => show_position(nav, track, presenter, options),
            Ok(NavOutcome::History(tracks)) => {
                let titles: Vec<String> = tracks.iter().map(|t| t.title().to_string()).collect();
                presenter.history(&titles);
            }
            Ok(NavOutcome::Ended) | Ok(NavOutcome::Ignored) => {}
            Err(e @ (NavError::NoMatch(_) | NavError::InvalidSelection { .. } | NavError::NotPositioned)) => {
                presenter.notice(&e.to_string());
            }
            Err(e) => {
                log::warn!("Navigation error: {e}");
                presenter.notice(&e.to_string());
            }
        }
    }

    log::debug!("Session ended after {} tracks", nav.history().len());
    Ok(())
}

fn show_position<P: Presenter + ?Sized>(
    nav: &Navigator<'_>,
    track: &Track,
    presenter: &mut P,
    options: SessionOptions,
) {
    presenter.current(&TrackView::from(track));
    match nav.ranked_transitions() {
        Ok(ranked) => {
            let views: Vec<ChoiceView> = ranked
                .iter()
                .map(|r| ChoiceView::new(r, track, options.show_key_match))
                .collect();
            presenter.choices(&views);
        }
        Err(e) => presenter.notice(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransitionGraph;
    use crate::model::{TrackDetails, Transition};
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        prompts: usize,
        current: Vec<String>,
        choices: Vec<Vec<ChoiceView>>,
        history: Vec<Vec<String>>,
        notices: Vec<String>,
    }

    impl Presenter for Recorder {
        fn prompt(&mut self, _state: NavState) {
            self.prompts += 1;
        }
        fn current(&mut self, track: &TrackView) {
            self.current.push(track.title.clone());
        }
        fn choices(&mut self, choices: &[ChoiceView]) {
            self.choices.push(choices.to_vec());
        }
        fn history(&mut self, titles: &[String]) {
            self.history.push(titles.to_vec());
        }
        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn graph() -> TransitionGraph {
        let mut g = TransitionGraph::new();
        for (id, title, key) in [(1, "A", "8A"), (2, "B", "10B"), (3, "C", "9A")] {
            let details = TrackDetails { key: Some(key.parse().unwrap()), ..Default::default() };
            g.add_track(Track::new(id, title, "DJ", details).unwrap()).unwrap();
        }
        g.add_transition(Transition::new(1, 2, 3, TransitionType::Blend).unwrap()).unwrap();
        g.add_transition(
            Transition::new(1, 3, 5, TransitionType::EchoOut).unwrap().with_notes("echo on 4"),
        )
        .unwrap();
        g
    }

    #[test]
    fn test_session_walk() {
        let g = graph();
        let mut nav = Navigator::new(&g);
        let mut rec = Recorder::default();
        let input = Cursor::new("nothing\nA\n9\n1\nhistory\nq\nB\n");

        run(&mut nav, input, &mut rec, SessionOptions::default()).unwrap();

        assert_eq!(rec.current, vec!["A", "C"]);
        assert_eq!(rec.history, vec![vec!["A".to_string(), "C".to_string()]]);
        assert_eq!(rec.notices.len(), 2);
        assert!(rec.notices[0].contains("nothing"));
        assert!(rec.notices[1].contains("choose 1-2"));

        let first = &rec.choices[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].title, "C");
        assert_eq!(first[0].stars, "★★★★★");
        assert_eq!(first[0].notes.as_deref(), Some("echo on 4"));
        assert_eq!(first[0].key_match, Some(true));
        assert_eq!(first[1].title, "B");
        assert_eq!(first[1].key_match, Some(false));
        // C is a dead end.
        assert!(rec.choices[1].is_empty());

        // "B" after quit is never read.
        assert_eq!(rec.prompts, 6);
        assert_eq!(nav.state(), NavState::Ended);
    }

    #[test]
    fn test_end_of_input_ends_session() {
        let g = graph();
        let mut nav = Navigator::new(&g);
        let mut rec = Recorder::default();
        run(&mut nav, Cursor::new("a\n"), &mut rec, SessionOptions { show_key_match: false }).unwrap();
        assert_eq!(nav.state(), NavState::Ended);
        assert_eq!(rec.choices[0][0].key_match, None);
    }
}
