//! The environment collaborator.
//!
//! The agent only ever talks to an environment through [`Environment`]. How
//! the simulator is hosted (in-process, subprocess, remote) is the
//! implementor's business; its failures surface as [`EnvironmentError`].

use ndarray::Array1;
use std::error::Error as StdError;
use std::path::Path;
use thiserror::Error;

pub type Observation = Array1<f32>;

/// Result of a single environment step
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
}

impl Outcome {
    pub fn new(observation: Observation, reward: f32, done: bool) -> Self {
        Outcome {
            observation,
            reward,
            done,
        }
    }
}

/// Opaque failure reported by an environment
#[derive(Debug, Error)]
#[error("environment error: {message}")]
pub struct EnvironmentError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl EnvironmentError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        EnvironmentError {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap the error that caused the failure
    pub fn with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        EnvironmentError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for EnvironmentError {
    fn from(err: std::io::Error) -> Self {
        EnvironmentError::with_source("io failure", err)
    }
}

pub type EnvResult<T> = std::result::Result<T, EnvironmentError>;

/// An episodic environment with a discrete action space.
///
/// All mutation goes through `reset` and `step`.
pub trait Environment {
    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> EnvResult<Observation>;

    /// Apply `action` and return what happened.
    fn step(&mut self, action: usize) -> EnvResult<Outcome>;

    /// Hard upper bound on timesteps per episode
    fn max_steps(&self) -> usize;

    /// Number of discrete actions
    fn action_space(&self) -> usize;

    /// Width of an observation vector
    fn observation_size(&self) -> usize;

    /// Write a rendering of the current episode under `target`.
    fn render(&mut self, _target: &Path) -> EnvResult<()> {
        Ok(())
    }

    /// Release resources held by the environment.
    fn end(&mut self) {}
}
