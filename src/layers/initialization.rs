use ndarray::{Array1, Array2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{AurumError, Result};

/// Weight initialization strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization
    XavierUniform,

    /// Xavier/Glorot normal initialization
    XavierNormal,

    /// He/Kaiming uniform initialization (for ReLU)
    HeUniform,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// Normal distribution with custom mean and std
    Normal { mean: f32, std: f32 },

    /// All zeros
    Zeros,

    /// All ones
    Ones,
}

impl WeightInit {
    /// Initialize a `(fan_in, fan_out)` weight matrix
    pub fn initialize_weights(&self, shape: (usize, usize), rng: &mut StdRng) -> Result<Array2<f32>> {
        let (fan_in, fan_out) = shape;

        let weights = match self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                Array2::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::XavierNormal => {
                let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
                Array2::random_using(shape, normal(0.0, std)?, rng)
            }

            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in as f32).sqrt();
                Array2::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::HeNormal => {
                let std = (2.0 / fan_in as f32).sqrt();
                Array2::random_using(shape, normal(0.0, std)?, rng)
            }

            WeightInit::Uniform { min, max } => {
                if min >= max {
                    return Err(AurumError::invalid_parameter(
                        "weight_init".to_string(),
                        format!("uniform range [{}, {}) is empty", min, max),
                    ));
                }
                Array2::random_using(shape, Uniform::new(*min, *max), rng)
            }

            WeightInit::Normal { mean, std } => Array2::random_using(shape, normal(*mean, *std)?, rng),

            WeightInit::Zeros => Array2::zeros(shape),

            WeightInit::Ones => Array2::ones(shape),
        };
        Ok(weights)
    }

    /// Initialize biases for a layer. Fan-scaled schemes start biases at zero.
    pub fn initialize_biases(&self, size: usize, rng: &mut StdRng) -> Result<Array1<f32>> {
        let biases = match self {
            WeightInit::Zeros
            | WeightInit::XavierUniform
            | WeightInit::XavierNormal
            | WeightInit::HeUniform
            | WeightInit::HeNormal => Array1::zeros(size),

            WeightInit::Ones => Array1::ones(size),

            WeightInit::Uniform { min, max } => {
                if min >= max {
                    return Err(AurumError::invalid_parameter(
                        "weight_init".to_string(),
                        format!("uniform range [{}, {}) is empty", min, max),
                    ));
                }
                Array1::random_using(size, Uniform::new(*min, *max), rng)
            }

            WeightInit::Normal { mean, std } => Array1::random_using(size, normal(*mean, *std)?, rng),
        };
        Ok(biases)
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: &Activation) -> Self {
        match activation {
            Activation::Relu | Activation::LeakyRelu { .. } => WeightInit::HeNormal,
            Activation::Sigmoid | Activation::Tanh | Activation::Softmax { .. } | Activation::Linear => {
                WeightInit::XavierNormal
            }
        }
    }
}

fn normal(mean: f32, std: f32) -> Result<Normal<f32>> {
    Normal::new(mean, std).map_err(|e| {
        AurumError::invalid_parameter("weight_init".to_string(), format!("std {}: {}", std, e))
    })
}

/// Options passed to `Layer::compile`.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Overrides each layer's own initializer when set
    pub init: Option<WeightInit>,
    /// Seed for parameter initialization; entropy when unset
    pub seed: Option<u64>,
}

impl CompileOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_init(mut self, init: WeightInit) -> Self {
        self.init = Some(init);
        self
    }

    /// Options for the `index`-th layer of a stack: same initializer, a
    /// distinct derived seed.
    pub fn for_layer(&self, index: usize) -> Self {
        CompileOptions {
            init: self.init.clone(),
            seed: self.seed.map(|s| s.wrapping_add(index as u64 + 1)),
        }
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
