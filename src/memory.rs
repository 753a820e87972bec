//! Experience replay.

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::env::{Observation, Outcome};
use crate::error::{AurumError, Result};

/// Added to every priority so no event becomes unsampleable
const PRIORITY_EPSILON: f32 = 0.01;

/// A recorded transition. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    state: Observation,
    action: usize,
    outcome: Outcome,
}

impl Event {
    pub fn new(state: Observation, action: usize, outcome: Outcome) -> Self {
        Event {
            state,
            action,
            outcome,
        }
    }

    pub fn state(&self) -> &Observation {
        &self.state
    }

    pub fn action(&self) -> usize {
        self.action
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn reward(&self) -> f32 {
        self.outcome.reward
    }

    pub fn next_state(&self) -> &Observation {
        &self.outcome.observation
    }

    pub fn done(&self) -> bool {
        self.outcome.done
    }
}

/// How `ExperienceStore::sample` picks events
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum SamplingPolicy {
    /// Every stored event is equally likely
    #[default]
    Uniform,
    /// Probability proportional to `(priority + 0.01)^alpha`, where the
    /// priority is the absolute TD error of the event's last learn step.
    /// New events get the highest priority seen so far.
    Prioritized { alpha: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of events kept; `None` keeps everything
    pub capacity: Option<usize>,
    pub sampling: SamplingPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            capacity: Some(10_000),
            sampling: SamplingPolicy::Uniform,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(AurumError::invalid_parameter(
                "capacity",
                "a bounded store needs room for at least one event",
            ));
        }
        if let SamplingPolicy::Prioritized { alpha } = self.sampling {
            if !(alpha >= 0.0 && alpha.is_finite()) {
                return Err(AurumError::invalid_parameter(
                    "alpha".to_string(),
                    format!("{} is not a finite non-negative exponent", alpha),
                ));
            }
        }
        Ok(())
    }
}

/// Events drawn by one `sample` call.
///
/// `indices` are store positions at sampling time and stay valid for
/// `update_priorities` until the next `remember`.
#[derive(Debug)]
pub struct Sample<'a> {
    pub events: Vec<&'a Event>,
    pub indices: Vec<usize>,
}

/// FIFO replay memory, exclusively owned by the agent.
#[derive(Clone, Debug)]
pub struct ExperienceStore {
    events: VecDeque<Event>,
    priorities: VecDeque<f32>,
    capacity: Option<usize>,
    sampling: SamplingPolicy,
    max_priority: f32,
    rng: StdRng,
}

impl ExperienceStore {
    /// A store whose sampling is reproducible when `seed` is set
    pub fn new(config: &MemoryConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(ExperienceStore {
            events: VecDeque::with_capacity(config.capacity.unwrap_or(0)),
            priorities: VecDeque::with_capacity(config.capacity.unwrap_or(0)),
            capacity: config.capacity,
            sampling: config.sampling,
            max_priority: 1.0,
            rng,
        })
    }

    /// Uniform store with the given bound
    pub fn bounded(capacity: usize, seed: u64) -> Result<Self> {
        Self::new(
            &MemoryConfig {
                capacity: Some(capacity),
                sampling: SamplingPolicy::Uniform,
            },
            Some(seed),
        )
    }

    /// Record an event, evicting the oldest one when full.
    pub fn remember(&mut self, event: Event) {
        if let Some(capacity) = self.capacity {
            if self.events.len() == capacity {
                self.events.pop_front();
                self.priorities.pop_front();
            }
        }
        self.events.push_back(event);
        self.priorities.push_back(self.max_priority);
    }

    /// Draw `batch_size` distinct events.
    pub fn sample(&mut self, batch_size: usize) -> Result<Sample<'_>> {
        if batch_size == 0 {
            return Err(AurumError::EmptyBatch);
        }
        if self.events.len() < batch_size {
            return Err(AurumError::InsufficientData {
                requested: batch_size,
                available: self.events.len(),
            });
        }

        let indices = match self.sampling {
            SamplingPolicy::Uniform => index::sample(&mut self.rng, self.events.len(), batch_size).into_vec(),
            SamplingPolicy::Prioritized { alpha } => {
                let weights: Vec<f32> = self
                    .priorities
                    .iter()
                    .map(|&p| (p + PRIORITY_EPSILON).powf(alpha))
                    .collect();
                let positions: Vec<usize> = (0..self.events.len()).collect();
                positions
                    .choose_multiple_weighted(&mut self.rng, batch_size, |&i| weights[i])
                    .map_err(|e| AurumError::Numerical(format!("priority weights: {}", e)))?
                    .copied()
                    .collect()
            }
        };

        let events = indices.iter().map(|&i| &self.events[i]).collect();
        Ok(Sample { events, indices })
    }

    /// Set the priority of previously sampled events to their absolute TD error.
    pub fn update_priorities(&mut self, indices: &[usize], td_errors: &[f32]) {
        for (&i, &td) in indices.iter().zip(td_errors) {
            if let Some(priority) = self.priorities.get_mut(i) {
                let p = td.abs();
                if p.is_finite() {
                    *priority = p;
                    self.max_priority = self.max_priority.max(p);
                }
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Events from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn sampling(&self) -> SamplingPolicy {
        self.sampling
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.priorities.clear();
        self.max_priority = 1.0;
    }
}
