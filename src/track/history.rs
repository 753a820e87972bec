use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::episode::EpisodeSummary;

/// Rolling record of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Loss of each successful learn step
    pub losses: VecDeque<f32>,

    /// Exploration rate at the end of each episode
    pub epsilons: VecDeque<f32>,

    /// Flushed episode summaries
    pub episodes: VecDeque<EpisodeSummary>,

    history_size: usize,
    learn_steps: usize,
    episode_count: usize,
    total_steps: usize,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, limit: usize) {
    if queue.len() >= limit {
        queue.pop_front();
    }
    queue.push_back(value);
}

impl TrainingHistory {
    pub fn new(history_size: usize) -> Self {
        TrainingHistory {
            losses: VecDeque::with_capacity(history_size),
            epsilons: VecDeque::with_capacity(history_size),
            episodes: VecDeque::with_capacity(history_size),
            history_size: history_size.max(1),
            learn_steps: 0,
            episode_count: 0,
            total_steps: 0,
        }
    }

    pub fn record_loss(&mut self, loss: f32) {
        push_bounded(&mut self.losses, loss, self.history_size);
        self.learn_steps += 1;
    }

    pub fn record_epsilon(&mut self, epsilon: f32) {
        push_bounded(&mut self.epsilons, epsilon, self.history_size);
    }

    pub fn record_episode(&mut self, summary: EpisodeSummary) {
        self.total_steps += summary.steps;
        self.episode_count += 1;
        push_bounded(&mut self.episodes, summary, self.history_size);
    }

    /// Learn steps recorded, including those no longer in the window
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Mean of the last `window` losses
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        let n = window.min(self.losses.len());
        if n == 0 {
            return None;
        }
        let sum: f32 = self.losses.iter().rev().take(n).sum();
        Some(sum / n as f32)
    }

    /// Mean of a named episode scalar over the last `window` episodes that tracked it
    pub fn avg_scalar(&self, name: &str, window: usize) -> Option<f32> {
        let values: Vec<f32> = self
            .episodes
            .iter()
            .rev()
            .filter_map(|e| e.scalar(name))
            .take(window)
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }

    pub fn last_episode(&self) -> Option<&EpisodeSummary> {
        self.episodes.back()
    }
}
