//! # Aurum - episodic deep Q-learning on ndarray
//!
//! Aurum drives an agent through episodes against an [`Environment`],
//! records transitions in an experience store and periodically fits a
//! Q-network policy to bootstrapped targets.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aurum::{Agent, AgentConfig, Environment};
//!
//! fn train(env: &mut dyn Environment) -> aurum::Result<()> {
//!     let mut agent = Agent::new(AgentConfig::default().with_seed(42), &*env)?;
//!     let report = agent.train(env, 200)?;
//!     println!("best score {:?}", report.best_score());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions (ReLU, Sigmoid, Tanh, Softmax, etc.)
//! - [`layers`] - The [`Layer`] trait, dense and activation layers, initializers
//! - [`loss`] - Loss functions for the learn step
//! - [`optimizer`] - SGD, Adam, RMSProp and gradient clipping
//! - [`policy`] - Layer stacks with a forward pass and a learn step
//! - [`schedule`] - Exploration-rate decay
//! - [`memory`] - Experience replay
//! - [`episode`] - Episode/timestep iteration and episode-scoped scalars
//! - [`track`] - Background tracking thread and training history
//! - [`env`] - The environment interface
//! - [`config`] - Serde configuration
//! - [`agent`] - The DQN agent and its training driver
//! - [`error`] - Error types and result handling

pub mod activations;
pub mod agent;
pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod layers;
pub mod loss;
pub mod memory;
pub mod optimizer;
pub mod policy;
pub mod schedule;
pub mod track;

pub use activations::Activation;
pub use agent::{Agent, TrainingReport};
pub use config::{AgentConfig, Hyperparameters};
pub use env::{Environment, EnvironmentError, Outcome};
pub use episode::{Aggregator, Episode, EpisodeStatus, Episodes};
pub use error::{AurumError, Result};
pub use layers::Layer;
pub use memory::{Event, ExperienceStore};
pub use policy::{Policy, PolicyConfig};
pub use schedule::DecaySchedule;

#[cfg(test)]
mod tests;
