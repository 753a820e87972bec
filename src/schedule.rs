//! Exploration-rate scheduling.
//!
//! A [`DecaySchedule`] maps a step counter to an exploration rate. The rate
//! never increases and never drops below its floor. The agent advances it
//! once per finished episode.

use serde::{Deserialize, Serialize};

use crate::error::{AurumError, Result};

/// How the rate shrinks on each advance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Decay {
    /// `rate_n = initial * factor^n`
    Exponential { factor: f32 },
    /// `rate_n = initial - n * step`
    Linear { step: f32 },
}

/// Serializable description of a [`DecaySchedule`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub initial: f32,
    pub decay: Decay,
    pub floor: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        DecayConfig {
            initial: 1.0,
            decay: Decay::Exponential { factor: 0.995 },
            floor: 0.0,
        }
    }
}

impl DecayConfig {
    pub fn exponential(initial: f32, factor: f32) -> Self {
        DecayConfig {
            initial,
            decay: Decay::Exponential { factor },
            floor: 0.0,
        }
    }

    pub fn linear(initial: f32, step: f32) -> Self {
        DecayConfig {
            initial,
            decay: Decay::Linear { step },
            floor: 0.0,
        }
    }

    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.initial > 0.0 && self.initial <= 1.0) {
            return Err(AurumError::invalid_parameter(
                "initial".to_string(),
                format!("{} is outside (0, 1]", self.initial),
            ));
        }
        if !(self.floor >= 0.0 && self.floor <= self.initial) {
            return Err(AurumError::invalid_parameter(
                "floor".to_string(),
                format!("{} is outside [0, {}]", self.floor, self.initial),
            ));
        }
        match self.decay {
            Decay::Exponential { factor } if !(factor > 0.0 && factor <= 1.0) => Err(
                AurumError::invalid_parameter("factor".to_string(), format!("{} is outside (0, 1]", factor)),
            ),
            Decay::Linear { step } if !(step >= 0.0 && step.is_finite()) => Err(
                AurumError::invalid_parameter("step".to_string(), format!("{} is not a finite non-negative step", step)),
            ),
            _ => Ok(()),
        }
    }

    pub fn build(&self) -> Result<DecaySchedule> {
        self.validate()?;
        Ok(DecaySchedule {
            config: self.clone(),
            current: self.initial,
            steps: 0,
        })
    }
}

/// Exploration rate as a deterministic function of its step count
#[derive(Clone, Debug, PartialEq)]
pub struct DecaySchedule {
    config: DecayConfig,
    current: f32,
    steps: usize,
}

impl DecaySchedule {
    /// Exponential schedule with no floor
    pub fn new(initial: f32, factor: f32) -> Result<Self> {
        DecayConfig::exponential(initial, factor).build()
    }

    /// Current rate
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Number of advances so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Apply one decay step and return the new rate.
    pub fn advance(&mut self) -> f32 {
        self.steps += 1;
        // min() keeps the sequence non-increasing under float rounding
        self.current = self.value_at(self.steps).min(self.current);
        self.current
    }

    /// The rate after `steps` advances
    pub fn value_at(&self, steps: usize) -> f32 {
        let DecayConfig { initial, floor, .. } = self.config;
        let raw = match self.config.decay {
            Decay::Exponential { factor } => initial * factor.powf(steps as f32),
            Decay::Linear { step } => initial - step * steps as f32,
        };
        raw.max(floor)
    }

    /// Back to the initial rate
    pub fn reset(&mut self) {
        self.current = self.config.initial;
        self.steps = 0;
    }
}

impl Default for DecaySchedule {
    fn default() -> Self {
        DecaySchedule {
            config: DecayConfig::default(),
            current: 1.0,
            steps: 0,
        }
    }
}
