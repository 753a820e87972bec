use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{AgentConfig, Hyperparameters};
use crate::env::Environment;
use crate::episode::{Aggregator, Episode, EpisodeSummary, Episodes};
use crate::error::{AurumError, Result};
use crate::memory::{Event, ExperienceStore, Sample};
use crate::policy::{Batch, Policy};
use crate::schedule::DecaySchedule;
use crate::track::{TrackMsg, Tracker, TrainingHistory};

/// A deep Q-learning agent.
///
/// Owns a live policy, a target policy that is re-cloned from it every
/// `update_target_steps` successful learn steps, an ε schedule and an
/// experience store. The exploration rate is advanced once per episode,
/// by [`Agent::finish_episode`]; [`Agent::action`] only reads it.
///
/// # Example
///
/// ```no_run
/// use aurum::agent::Agent;
/// use aurum::config::AgentConfig;
/// use aurum::episode::Aggregator;
/// use aurum::env::Environment;
/// use aurum::memory::Event;
///
/// fn run(env: &mut dyn Environment) -> aurum::Result<()> {
///     let mut agent = Agent::new(AgentConfig::default().with_seed(7), &*env)?;
///     agent.view();
///     for episode in agent.make_episodes(100, env.max_steps()) {
///         let mut state = env.reset()?;
///         let score = episode.track_scalar("score", 0.0, Aggregator::Max);
///         for _ in episode.steps() {
///             let action = agent.action(state.view())?;
///             let outcome = env.step(action)?;
///             score.inc(outcome.reward);
///             let next = outcome.observation.clone();
///             if outcome.done {
///                 episode.done();
///             }
///             agent.remember(Event::new(state, action, outcome))?;
///             agent.learn()?;
///             state = next;
///         }
///         agent.finish_episode(episode);
///     }
///     agent.wait();
///     env.end();
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Agent {
    policy: Policy,
    target: Policy,
    epsilon: DecaySchedule,
    memory: ExperienceStore,
    hyperparameters: Hyperparameters,
    learn_every: usize,
    render_dir: Option<PathBuf>,
    observation_size: usize,
    num_actions: usize,
    learn_steps: usize,
    rng: StdRng,
    tracker: Tracker,
}

/// Outcome of [`Agent::train`]
#[derive(Clone, Debug, Default)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeSummary>,
    /// Successful learn steps during the run
    pub learn_steps: usize,
    pub last_loss: Option<f32>,
    pub final_epsilon: f32,
}

impl TrainingReport {
    pub fn best_score(&self) -> Option<f32> {
        self.episodes
            .iter()
            .filter_map(|e| e.scalar("score"))
            .fold(None, |best, s| Some(best.map_or(s, |b: f32| b.max(s))))
    }

    pub fn mean_total_reward(&self) -> Option<f32> {
        let totals: Vec<f32> = self.episodes.iter().filter_map(|e| e.scalar("total_reward")).collect();
        if totals.is_empty() {
            None
        } else {
            Some(totals.iter().sum::<f32>() / totals.len() as f32)
        }
    }
}

fn argmax(values: ArrayView1<f32>) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            return Err(AurumError::Numerical(format!("q-value {} is NaN", i)));
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| AurumError::Numerical("policy produced no q-values".to_string()))
}

impl Agent {
    /// Build an agent sized for `env`'s observation and action spaces.
    pub fn new(config: AgentConfig, env: &dyn Environment) -> Result<Self> {
        config.validate()?;
        let observation_size = env.observation_size();
        let num_actions = env.action_space();
        if observation_size == 0 || num_actions == 0 {
            return Err(AurumError::invalid_parameter(
                "environment".to_string(),
                format!(
                    "observation size {} and action space {} must both be non-zero",
                    observation_size, num_actions
                ),
            ));
        }

        let policy = Policy::build(&config.policy, observation_size, num_actions, config.seed)?;
        let target = policy.clone();
        let memory = ExperienceStore::new(&config.memory, config.seed.map(|s| s.rotate_left(32)))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
            None => StdRng::from_entropy(),
        };
        let epsilon = config.hyperparameters.epsilon.build()?;
        let tracker = Tracker::spawn(config.history_size)?;

        info!(
            observation_size,
            num_actions,
            batch_size = policy.batch_size(),
            seed = ?config.seed,
            "agent created"
        );

        Ok(Agent {
            policy,
            target,
            epsilon,
            memory,
            hyperparameters: config.hyperparameters,
            learn_every: config.learn_every,
            render_dir: config.render_dir,
            observation_size,
            num_actions,
            learn_steps: 0,
            rng,
            tracker,
        })
    }

    /// ε-greedy action for `state`. Does not advance the schedule.
    pub fn action(&mut self, state: ArrayView1<f32>) -> Result<usize> {
        if state.len() != self.observation_size {
            return Err(AurumError::shape(
                format!("state of width {}", self.observation_size),
                format!("width {}", state.len()),
            ));
        }
        if self.rng.gen::<f32>() < self.epsilon.value() {
            return Ok(self.rng.gen_range(0..self.num_actions));
        }
        let q_values = self.policy.fwd(state)?;
        argmax(q_values.view())
    }

    /// Record a transition. Malformed events are rejected before the store changes.
    pub fn remember(&mut self, event: Event) -> Result<()> {
        let width = self.observation_size;
        if event.state().len() != width || event.next_state().len() != width {
            return Err(AurumError::shape(
                format!("observations of width {}", width),
                format!("{} and {}", event.state().len(), event.next_state().len()),
            ));
        }
        if event.action() >= self.num_actions {
            return Err(AurumError::invalid_parameter(
                "action".to_string(),
                format!("{} is outside 0..{}", event.action(), self.num_actions),
            ));
        }
        self.memory.remember(event);
        Ok(())
    }

    /// One learn step on a sampled batch.
    ///
    /// Returns `Ok(None)` when the store cannot fill a batch yet. Any other
    /// failure is returned as is and leaves the policy unchanged.
    pub fn learn(&mut self) -> Result<Option<f32>> {
        let batch_size = self.policy.batch_size();
        let sample = match self.memory.sample(batch_size) {
            Ok(sample) => sample,
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "skipping learn step");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Sample { events, indices } = sample;

        let n = events.len();
        let width = self.observation_size;
        let mut states = Array2::zeros((n, width));
        let mut next_states = Array2::zeros((n, width));
        let mut actions = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut dones = Vec::with_capacity(n);
        for (i, event) in events.iter().enumerate() {
            states.row_mut(i).assign(event.state());
            next_states.row_mut(i).assign(event.next_state());
            actions.push(event.action());
            rewards.push(event.reward());
            dones.push(event.done());
        }
        drop(events);

        let current = self.policy.fwd_batch(states.view())?;
        let next_target = self.target.fwd_batch(next_states.view())?;
        let next_online = if self.hyperparameters.double_dqn {
            Some(self.policy.fwd_batch(next_states.view())?)
        } else {
            None
        };

        let gamma = self.hyperparameters.gamma;
        let mut targets = current.clone();
        let mut td_errors = vec![0.0; n];
        for i in 0..n {
            let value = if dones[i] {
                rewards[i]
            } else {
                let bootstrap = match &next_online {
                    Some(online) => next_target[[i, argmax(online.row(i))?]],
                    None => next_target.row(i).fold(f32::NEG_INFINITY, |m, &q| m.max(q)),
                };
                rewards[i] + gamma * bootstrap
            };
            td_errors[i] = value - current[[i, actions[i]]];
            targets[[i, actions[i]]] = value;
        }

        let batch = Batch::new(states, targets)?;
        let loss = match self.policy.learn(&batch) {
            Ok(loss) => loss,
            Err(e) if e.is_recoverable() => return Ok(None),
            Err(e) => return Err(e),
        };

        self.memory.update_priorities(&indices, &td_errors);
        self.learn_steps += 1;
        if self.learn_steps % self.hyperparameters.update_target_steps == 0 {
            self.sync_target();
        }
        if self.policy.tracks() {
            self.tracker.send(TrackMsg::Loss(loss));
        }
        Ok(Some(loss))
    }

    /// Copy the live policy into the target network.
    pub fn sync_target(&mut self) {
        self.target = self.policy.clone();
        debug!(learn_steps = self.learn_steps, "target network synced");
    }

    /// Block until all queued tracking work has been processed.
    pub fn wait(&self) {
        self.tracker.wait();
    }

    /// Log the policy graph.
    pub fn view(&self) {
        for line in self.policy.summary().lines() {
            info!("{}", line);
        }
    }

    /// `count` episodes of at most `max_steps` timesteps, reporting to this agent's tracker
    pub fn make_episodes(&self, count: usize, max_steps: usize) -> Episodes {
        let episodes = Episodes::new(count, max_steps);
        match self.tracker.sink() {
            Some(sink) => episodes.with_sink(sink),
            None => episodes,
        }
    }

    /// Flush `episode` and advance the exploration schedule by one step.
    pub fn finish_episode(&mut self, episode: Episode) -> EpisodeSummary {
        let summary = episode.log();
        let epsilon = self.epsilon.advance();
        self.tracker.send(TrackMsg::Epsilon(epsilon));
        summary
    }

    /// Ask `env` to render into the configured directory. No-op when unset.
    pub fn render(&self, env: &mut dyn Environment) -> Result<()> {
        if let Some(dir) = &self.render_dir {
            env.render(dir)?;
        }
        Ok(())
    }

    /// Run `episodes` episodes against `env`.
    ///
    /// Each episode tracks `score` (max reward) and `total_reward` (sum).
    /// The environment is rendered after every non-terminal step.
    /// The first error ends the run; the unfinished episode is flushed but
    /// the schedule is not advanced for it.
    pub fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<TrainingReport> {
        let mut report = TrainingReport::default();
        let max_steps = env.max_steps();

        for episode in self.make_episodes(episodes, max_steps) {
            let score = episode.track_scalar("score", 0.0, Aggregator::Max);
            let total = episode.track_scalar("total_reward", 0.0, Aggregator::Sum);
            let mut state = env.reset()?;

            for step in episode.steps() {
                let action = self.action(state.view())?;
                let outcome = env.step(action)?;
                score.inc(outcome.reward);
                total.inc(outcome.reward);

                let next = outcome.observation.clone();
                let terminal = outcome.done;
                if terminal {
                    episode.done();
                }
                self.remember(Event::new(state, action, outcome))?;

                if (step.index() + 1) % self.learn_every == 0 {
                    if let Some(loss) = self.learn()? {
                        report.learn_steps += 1;
                        report.last_loss = Some(loss);
                    }
                }
                if !terminal {
                    self.render(env)?;
                }
                state = next;
            }

            report.episodes.push(self.finish_episode(episode));
        }

        self.wait();
        report.final_epsilon = self.epsilon.value();
        Ok(report)
    }

    /// Current exploration rate
    pub fn epsilon(&self) -> f32 {
        self.epsilon.value()
    }

    pub fn schedule(&self) -> &DecaySchedule {
        &self.epsilon
    }

    /// Replace the exploration schedule
    pub fn set_schedule(&mut self, schedule: DecaySchedule) {
        self.epsilon = schedule;
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn target_policy(&self) -> &Policy {
        &self.target
    }

    pub fn memory(&self) -> &ExperienceStore {
        &self.memory
    }

    /// Successful learn steps so far
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Snapshot of the tracker's history; call `wait` first for an up-to-date view.
    pub fn history(&self) -> TrainingHistory {
        self.tracker.history()
    }
}
