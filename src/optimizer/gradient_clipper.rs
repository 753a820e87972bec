use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Gradient clipping methods, applied before the optimizer step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum GradientClipper {
    /// Clip every component into `[min, max]`
    ClipByValue { min: f32, max: f32 },

    /// Rescale each gradient tensor whose norm exceeds `max_norm`
    ClipByNorm { max_norm: f32 },

    /// Rescale all gradients together when their joint norm exceeds `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    #[default]
    None,
}

impl GradientClipper {
    pub fn clip(&self, grads: &mut [ArrayD<f32>]) {
        match self {
            GradientClipper::ClipByValue { min, max } => {
                for grad in grads.iter_mut() {
                    grad.mapv_inplace(|g| g.max(*min).min(*max));
                }
            }

            GradientClipper::ClipByNorm { max_norm } => {
                for grad in grads.iter_mut() {
                    let norm = grad.iter().map(|&g| g * g).sum::<f32>().sqrt();
                    if norm > *max_norm {
                        let scale = max_norm / norm;
                        grad.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::ClipByGlobalNorm { max_norm } => {
                let global_norm = Self::global_norm(grads);
                if global_norm > *max_norm {
                    let scale = max_norm / global_norm;
                    for grad in grads.iter_mut() {
                        grad.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::None => {}
        }
    }

    /// Joint L2 norm of all gradients
    pub fn global_norm(grads: &[ArrayD<f32>]) -> f32 {
        grads
            .iter()
            .map(|g| g.iter().map(|&x| x * x).sum::<f32>())
            .sum::<f32>()
            .sqrt()
    }
}
