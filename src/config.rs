//! Agent configuration.
//!
//! Every struct derives serde with `#[serde(default)]`, so a JSON file only
//! needs the fields it changes:
//!
//! ```
//! use aurum::config::AgentConfig;
//!
//! let config = AgentConfig::from_json_str(r#"{ "hyperparameters": { "gamma": 0.9 }, "seed": 3 }"#).unwrap();
//! assert_eq!(config.hyperparameters.gamma, 0.9);
//! assert_eq!(config.policy.batch_size, 32);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AurumError, Result};
use crate::policy::{LayerBuilder, PolicyConfig};
use crate::schedule::DecayConfig;

pub use crate::memory::{MemoryConfig, SamplingPolicy};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Discount factor for future rewards
    pub gamma: f32,
    /// Successful learn steps between target network syncs
    pub update_target_steps: usize,
    /// Pick the next action with the live policy and evaluate it with the target
    pub double_dqn: bool,
    /// Exploration schedule, advanced once per finished episode
    pub epsilon: DecayConfig,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            gamma: 0.99,
            update_target_steps: 100,
            double_dqn: false,
            epsilon: DecayConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub hyperparameters: Hyperparameters,
    pub policy: PolicyConfig,
    pub memory: MemoryConfig,
    /// Seeds weight init, exploration and sampling
    pub seed: Option<u64>,
    /// Timesteps between learn calls in `Agent::train`
    pub learn_every: usize,
    /// Where `Agent::render` writes; rendering is off when unset
    pub render_dir: Option<PathBuf>,
    /// Entries kept per series by the tracker
    pub history_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            hyperparameters: Hyperparameters::default(),
            policy: PolicyConfig::default(),
            memory: MemoryConfig::default(),
            seed: None,
            learn_every: 1,
            render_dir: None,
            history_size: 1000,
        }
    }
}

impl AgentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AgentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let hp = &self.hyperparameters;
        if !(0.0..=1.0).contains(&hp.gamma) {
            return Err(AurumError::Config(format!("gamma {} is outside [0, 1]", hp.gamma)));
        }
        if hp.update_target_steps == 0 {
            return Err(AurumError::Config("update_target_steps must be at least 1".to_string()));
        }
        if self.policy.batch_size == 0 {
            return Err(AurumError::Config("batch_size must be at least 1".to_string()));
        }
        if self.learn_every == 0 {
            return Err(AurumError::Config("learn_every must be at least 1".to_string()));
        }
        if let Some(capacity) = self.memory.capacity {
            if capacity < self.policy.batch_size {
                return Err(AurumError::Config(format!(
                    "memory capacity {} is smaller than batch size {}",
                    capacity, self.policy.batch_size
                )));
            }
        }
        let LayerBuilder::FullyConnected { hidden, .. } = &self.policy.layer_builder;
        if hidden.contains(&0) {
            return Err(AurumError::Config("hidden layers need at least one unit".to_string()));
        }
        hp.epsilon.validate()?;
        self.memory.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.memory.capacity, Some(10_000));
        assert_eq!(config.hyperparameters.update_target_steps, 100);
    }

    #[test]
    fn loads_partial_json_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "policy": {{ "batch_size": 8, "loss": {{ "Huber": {{ "delta": 1.0 }} }} }}, "memory": {{ "capacity": null }} }}"#
        )
        .unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.policy.batch_size, 8);
        assert_eq!(config.memory.capacity, None);
        assert_eq!(config.hyperparameters.gamma, 0.99);
    }

    #[test]
    fn rejects_capacity_below_batch_size() {
        let json = r#"{ "memory": { "capacity": 4 }, "policy": { "batch_size": 16 } }"#;
        assert!(matches!(AgentConfig::from_json_str(json), Err(AurumError::Config(_))));
    }

    #[test]
    fn round_trips_through_json() {
        let config = AgentConfig::default().with_seed(11);
        let back = AgentConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, back);
    }
}
