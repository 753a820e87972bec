//! Episode and timestep iteration.
//!
//! [`Episodes`] yields a fixed number of [`Episode`]s. Each episode yields
//! at most `max_steps` [`Timestep`]s through [`Episode::steps`], and stops
//! right after [`Episode::done`] is called. Both sequences are single-pass.
//!
//! ```
//! use aurum::episode::{Aggregator, Episodes, EpisodeStatus};
//!
//! for episode in Episodes::new(2, 10) {
//!     let score = episode.track_scalar("score", 0.0, Aggregator::Max);
//!     for step in episode.steps() {
//!         score.inc(step.index() as f32);
//!         if step.index() == 3 {
//!             episode.done();
//!         }
//!     }
//!     assert_eq!(episode.status(), EpisodeStatus::Completed);
//!     assert_eq!(score.value(), 3.0);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::track::{TrackMsg, TrackSink};

/// How successive `inc` values combine into a scalar
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregator {
    Sum,
    Max,
    Min,
    Mean,
    Last,
}

#[derive(Debug)]
struct Scalar {
    name: String,
    aggregator: Aggregator,
    value: f32,
    sum: f32,
    count: usize,
    closed: bool,
}

impl Scalar {
    fn apply(&mut self, x: f32) {
        self.count += 1;
        self.value = match self.aggregator {
            Aggregator::Sum => self.value + x,
            Aggregator::Max => self.value.max(x),
            Aggregator::Min => self.value.min(x),
            Aggregator::Mean => {
                self.sum += x;
                self.sum / self.count as f32
            }
            Aggregator::Last => x,
        };
    }
}

/// Handle to an episode-scoped scalar.
///
/// Clones share the same scalar. Once the episode is flushed further
/// `inc` calls are ignored.
#[derive(Clone, Debug)]
pub struct ScalarHandle(Rc<RefCell<Scalar>>);

impl ScalarHandle {
    fn new(name: &str, initial: f32, aggregator: Aggregator) -> Self {
        ScalarHandle(Rc::new(RefCell::new(Scalar {
            name: name.to_string(),
            aggregator,
            value: initial,
            sum: 0.0,
            count: 0,
            closed: false,
        })))
    }

    pub fn inc(&self, value: f32) {
        let mut scalar = self.0.borrow_mut();
        if !scalar.closed {
            scalar.apply(value);
        }
    }

    pub fn value(&self) -> f32 {
        self.0.borrow().value
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn aggregator(&self) -> Aggregator {
        self.0.borrow().aggregator
    }

    /// Number of `inc` calls applied
    pub fn count(&self) -> usize {
        self.0.borrow().count
    }

    fn close(&self) -> (String, f32) {
        let mut scalar = self.0.borrow_mut();
        scalar.closed = true;
        (scalar.name.clone(), scalar.value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Created,
    Running,
    /// The environment signalled done
    Completed,
    /// `max_steps` reached without done
    Truncated,
}

impl EpisodeStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, EpisodeStatus::Completed | EpisodeStatus::Truncated)
    }
}

/// What an episode reports when it is flushed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub index: usize,
    pub steps: usize,
    pub status: EpisodeStatus,
    pub scalars: Vec<(String, f32)>,
}

impl EpisodeSummary {
    pub fn scalar(&self, name: &str) -> Option<f32> {
        self.scalars.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
    }
}

/// A fixed-length, single-pass sequence of episodes.
#[derive(Debug)]
pub struct Episodes {
    next: usize,
    count: usize,
    max_steps: usize,
    sink: Option<TrackSink>,
}

impl Episodes {
    /// `count` episodes of at most `max_steps` timesteps, reporting nowhere
    pub fn new(count: usize, max_steps: usize) -> Self {
        Episodes {
            next: 0,
            count,
            max_steps,
            sink: None,
        }
    }

    /// Report flushed episodes to a tracker
    pub fn with_sink(mut self, sink: TrackSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl Iterator for Episodes {
    type Item = Episode;

    fn next(&mut self) -> Option<Episode> {
        if self.next >= self.count {
            return None;
        }
        let episode = Episode::new(self.next, self.max_steps, self.sink.clone());
        self.next += 1;
        Some(episode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Episodes {}

/// One interaction trajectory.
///
/// Scalars are flushed once, either by [`Episode::log`] or when the episode
/// is dropped.
#[derive(Debug)]
pub struct Episode {
    index: usize,
    max_steps: usize,
    status: Cell<EpisodeStatus>,
    steps: Cell<usize>,
    started: Cell<bool>,
    logged: Cell<bool>,
    scalars: RefCell<Vec<ScalarHandle>>,
    sink: Option<TrackSink>,
}

impl Episode {
    fn new(index: usize, max_steps: usize, sink: Option<TrackSink>) -> Self {
        Episode {
            index,
            max_steps,
            status: Cell::new(EpisodeStatus::Created),
            steps: Cell::new(0),
            started: Cell::new(false),
            logged: Cell::new(false),
            scalars: RefCell::new(Vec::new()),
            sink,
        }
    }

    /// Position of this episode in its `Episodes` sequence
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status.get()
    }

    /// Timesteps taken so far
    pub fn step_count(&self) -> usize {
        self.steps.get()
    }

    /// The timestep sequence. A second call yields nothing.
    pub fn steps(&self) -> Steps<'_> {
        let exhausted = self.started.replace(true);
        Steps {
            episode: self,
            exhausted,
        }
    }

    /// Mark the episode completed; the timestep sequence ends.
    pub fn done(&self) {
        if !self.status.get().is_finished() {
            self.status.set(EpisodeStatus::Completed);
        }
    }

    /// Register a scalar. Tracking an existing name returns its handle.
    pub fn track_scalar(&self, name: &str, initial: f32, aggregator: Aggregator) -> ScalarHandle {
        let mut scalars = self.scalars.borrow_mut();
        if let Some(handle) = scalars.iter().find(|h| h.0.borrow().name == name) {
            return handle.clone();
        }
        let handle = ScalarHandle::new(name, initial, aggregator);
        scalars.push(handle.clone());
        handle
    }

    pub fn scalar(&self, name: &str) -> Option<ScalarHandle> {
        self.scalars.borrow().iter().find(|h| h.0.borrow().name == name).cloned()
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            index: self.index,
            steps: self.steps.get(),
            status: self.status.get(),
            scalars: self
                .scalars
                .borrow()
                .iter()
                .map(|h| {
                    let s = h.0.borrow();
                    (s.name.clone(), s.value)
                })
                .collect(),
        }
    }

    /// Flush the episode's scalars. Only the first call reports to the
    /// tracker; every call returns the summary.
    pub fn log(&self) -> EpisodeSummary {
        if self.logged.replace(true) {
            return self.summary();
        }
        let scalars = self.scalars.borrow().iter().map(|h| h.close()).collect();
        let summary = EpisodeSummary {
            index: self.index,
            steps: self.steps.get(),
            status: self.status.get(),
            scalars,
        };
        if let Some(sink) = &self.sink {
            sink.send(TrackMsg::Episode(summary.clone()));
        }
        summary
    }

    pub fn is_logged(&self) -> bool {
        self.logged.get()
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        if !self.logged.get() {
            self.log();
        }
    }
}

/// A single timestep within an episode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestep {
    index: usize,
}

impl Timestep {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

/// Single-pass timestep iterator of one episode
#[derive(Debug)]
pub struct Steps<'a> {
    episode: &'a Episode,
    exhausted: bool,
}

impl<'a> Iterator for Steps<'a> {
    type Item = Timestep;

    fn next(&mut self) -> Option<Timestep> {
        if self.exhausted {
            return None;
        }
        let episode = self.episode;
        if episode.status.get().is_finished() {
            self.exhausted = true;
            return None;
        }
        let taken = episode.steps.get();
        if taken >= episode.max_steps {
            episode.status.set(EpisodeStatus::Truncated);
            self.exhausted = true;
            return None;
        }
        episode.steps.set(taken + 1);
        episode.status.set(EpisodeStatus::Running);
        Some(Timestep { index: taken })
    }
}
