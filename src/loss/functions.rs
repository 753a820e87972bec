use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// Trait defining the interface for loss functions over a batch of rows
pub trait Loss: Send + Sync {
    /// Compute the loss for a batch of predictions and targets
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32;

    /// Compute the gradient of the loss with respect to the predictions
    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32>;
}

/// Mean Squared Error loss, `sum((p - t)^2) / (2 * n * k)`
pub struct Mse;

impl Loss for Mse {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        (&diff * &diff).sum() / (2.0 * predictions.len() as f32)
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        (&predictions - &targets) / predictions.len() as f32
    }
}

/// Huber loss (smooth L1)
pub struct Huber {
    pub delta: f32,
}

impl Huber {
    pub fn new(delta: f32) -> Self {
        Huber { delta }
    }
}

impl Loss for Huber {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let delta = self.delta;
        let diff = &predictions - &targets;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= delta {
                0.5 * x * x
            } else {
                delta * abs_x - 0.5 * delta * delta
            }
        })
        .sum()
            / predictions.nrows() as f32
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let delta = self.delta;
        let diff = &predictions - &targets;
        diff.mapv(|x| if x.abs() <= delta { x } else { delta * x.signum() }) / predictions.nrows() as f32
    }
}

/// Cross-entropy loss for probability outputs (pair with a softmax layer)
pub struct CrossEntropy;

const CE_EPSILON: f32 = 1e-7;

impl Loss for CrossEntropy {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let total = Zip::from(&predictions)
            .and(&targets)
            .fold(0.0, |acc, &p, &t| acc - t * (p + CE_EPSILON).ln());
        total / predictions.nrows() as f32
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let batch_size = predictions.nrows() as f32;
        Zip::from(&predictions)
            .and(&targets)
            .map_collect(|&p, &t| -(t / (p + CE_EPSILON)) / batch_size)
    }
}

/// Loss selector used in policy configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum LossKind {
    #[default]
    Mse,
    Huber { delta: f32 },
    CrossEntropy,
}

impl Loss for LossKind {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        match self {
            LossKind::Mse => Mse.compute_batch(predictions, targets),
            LossKind::Huber { delta } => Huber::new(*delta).compute_batch(predictions, targets),
            LossKind::CrossEntropy => CrossEntropy.compute_batch(predictions, targets),
        }
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        match self {
            LossKind::Mse => Mse.gradient_batch(predictions, targets),
            LossKind::Huber { delta } => Huber::new(*delta).gradient_batch(predictions, targets),
            LossKind::CrossEntropy => CrossEntropy.gradient_batch(predictions, targets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mse_is_zero_on_exact_prediction() {
        let p = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(LossKind::Mse.compute_batch(p.view(), p.view()), 0.0);
        assert!(LossKind::Mse.gradient_batch(p.view(), p.view()).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn huber_is_linear_beyond_delta() {
        let p = array![[3.0]];
        let t = array![[0.0]];
        let huber = LossKind::Huber { delta: 1.0 };
        assert!((huber.compute_batch(p.view(), t.view()) - 2.5).abs() < 1e-6);
        assert_eq!(huber.gradient_batch(p.view(), t.view())[[0, 0]], 1.0);
    }
}
