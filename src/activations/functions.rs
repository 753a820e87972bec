use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{AurumError, Result};

/// Default negative slope for [`Activation::default_leaky_relu`].
pub const DEFAULT_LEAKY_ALPHA: f32 = 0.01;

/// An enumeration of the activation functions a layer can apply.
///
/// The set is closed; every operation dispatches with a `match`. Variant
/// parameters (`alpha`, `axes`) are fixed at construction and carried over
/// by `clone`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    Sigmoid,
    Tanh,
    #[default]
    Relu,
    LeakyRelu { alpha: f32 },
    /// Normalizes along `axes`. The axis-set has no default: an empty set
    /// is rejected at compile and forward time.
    Softmax { axes: Vec<usize> },
    Linear,
}

impl Activation {
    pub fn sigmoid() -> Self {
        Activation::Sigmoid
    }

    pub fn tanh() -> Self {
        Activation::Tanh
    }

    pub fn relu() -> Self {
        Activation::Relu
    }

    pub fn leaky_relu(alpha: f32) -> Self {
        Activation::LeakyRelu { alpha }
    }

    pub fn default_leaky_relu() -> Self {
        Activation::LeakyRelu {
            alpha: DEFAULT_LEAKY_ALPHA,
        }
    }

    pub fn softmax(axes: &[usize]) -> Self {
        Activation::Softmax {
            axes: axes.to_vec(),
        }
    }

    pub fn linear() -> Self {
        Activation::Linear
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::LeakyRelu { .. } => "leaky_relu",
            Activation::Softmax { .. } => "softmax",
            Activation::Linear => "linear",
        }
    }

    /// Forward pass through `x`.
    pub fn fwd(&self, x: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Activation::Sigmoid => Ok(x.mapv(sigmoid)),
            Activation::Tanh => Ok(x.mapv(f32::tanh)),
            Activation::Relu => Ok(x.mapv(|v| v.max(0.0))),
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                Ok(x.mapv(|v| if v > 0.0 { v } else { a * v }))
            }
            Activation::Softmax { axes } => {
                let lanes = Lanes::new(x.shape(), axes)?;
                let mut rows = lanes.gather(x)?;
                for mut row in rows.rows_mut() {
                    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
                lanes.scatter(rows)
            }
            Activation::Linear => Ok(x.to_owned()),
        }
    }

    /// Vector-Jacobian product: maps the gradient w.r.t. the output back to
    /// the gradient w.r.t. the input. `input` and `output` are the values seen
    /// and produced by the matching `fwd` call.
    pub fn backward(
        &self,
        input: ArrayViewD<f32>,
        output: ArrayViewD<f32>,
        output_grad: ArrayViewD<f32>,
    ) -> Result<ArrayD<f32>> {
        if input.shape() != output_grad.shape() || output.shape() != output_grad.shape() {
            return Err(AurumError::shape(
                format!("{:?}", input.shape()),
                format!("{:?}", output_grad.shape()),
            ));
        }

        let elementwise = |deriv: &dyn Fn(f32, f32) -> f32| {
            Zip::from(&input)
                .and(&output)
                .and(&output_grad)
                .map_collect(|&x, &y, &g| g * deriv(x, y))
        };

        match self {
            Activation::Sigmoid => Ok(elementwise(&|_, y| y * (1.0 - y))),
            Activation::Tanh => Ok(elementwise(&|_, y| 1.0 - y * y)),
            Activation::Relu => Ok(elementwise(&|x, _| if x > 0.0 { 1.0 } else { 0.0 })),
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                Ok(elementwise(&|x, _| if x > 0.0 { 1.0 } else { a }))
            }
            Activation::Softmax { axes } => {
                let lanes = Lanes::new(output.shape(), axes)?;
                let y = lanes.gather(output.view())?;
                let g = lanes.gather(output_grad.view())?;
                // dx = y * (g - <g, y>) along each normalized lane
                let dot = (&g * &y).sum_axis(Axis(1)).insert_axis(Axis(1));
                let dx = &y * &(&g - &dot);
                lanes.scatter(dx)
            }
            Activation::Linear => Ok(output_grad.to_owned()),
        }
    }

    /// Activations own no learnable parameters.
    pub fn learnables(&self) -> Vec<ArrayViewD<'_, f32>> {
        Vec::new()
    }

    /// Checks variant parameters against the rank of the input (batch axis
    /// included). Only Softmax has anything to check.
    pub fn compile(&self, rank: usize) -> Result<()> {
        if let Activation::Softmax { axes } = self {
            validate_axes(axes, rank)?;
        }
        Ok(())
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

fn validate_axes(axes: &[usize], rank: usize) -> Result<()> {
    if axes.is_empty() {
        return Err(AurumError::shape(
            "a non-empty softmax axis-set".to_string(),
            "no axes".to_string(),
        ));
    }
    for (i, &axis) in axes.iter().enumerate() {
        if axis >= rank {
            return Err(AurumError::shape(
                format!("softmax axes below rank {}", rank),
                format!("axis {}", axis),
            ));
        }
        if axes[..i].contains(&axis) {
            return Err(AurumError::shape(
                "distinct softmax axes".to_string(),
                format!("axis {} repeated", axis),
            ));
        }
    }
    Ok(())
}

/// Reshapes an n-d array so that every lane over a set of axes becomes one
/// row of a 2-d array, and back again.
struct Lanes {
    order: Vec<usize>,
    permuted_shape: Vec<usize>,
    outer: usize,
    inner: usize,
}

impl Lanes {
    fn new(shape: &[usize], axes: &[usize]) -> Result<Self> {
        validate_axes(axes, shape.len())?;

        let mut normalized = axes.to_vec();
        normalized.sort_unstable();
        let mut order: Vec<usize> = (0..shape.len()).filter(|a| !normalized.contains(a)).collect();
        let kept = order.len();
        order.extend(normalized);

        let permuted_shape: Vec<usize> = order.iter().map(|&a| shape[a]).collect();
        let outer = permuted_shape[..kept].iter().product();
        let inner = permuted_shape[kept..].iter().product();

        Ok(Lanes {
            order,
            permuted_shape,
            outer,
            inner,
        })
    }

    fn gather(&self, x: ArrayViewD<f32>) -> Result<Array2<f32>> {
        let permuted = x.permuted_axes(self.order.as_slice());
        let owned = permuted.as_standard_layout().into_owned();
        Ok(owned.into_shape((self.outer, self.inner))?)
    }

    fn scatter(&self, rows: Array2<f32>) -> Result<ArrayD<f32>> {
        let unflat = rows.into_shape(IxDyn(&self.permuted_shape))?;
        let mut inverse = vec![0; self.order.len()];
        for (i, &axis) in self.order.iter().enumerate() {
            inverse[axis] = i;
        }
        Ok(unflat
            .permuted_axes(inverse.as_slice())
            .as_standard_layout()
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn softmax_over_two_axes_sums_to_one_per_batch_item() {
        let x = Array::linspace(-1.0, 1.0, 12).into_shape((2, 3, 2)).unwrap().into_dyn();
        let y = Activation::softmax(&[1, 2]).fwd(x.view()).unwrap();
        assert_eq!(y.shape(), &[2, 3, 2]);
        for b in 0..2 {
            let total: f32 = y.index_axis(Axis(0), b).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn softmax_backward_of_uniform_gradient_is_zero() {
        let x = array![[0.3, -1.2, 2.0]].into_dyn();
        let act = Activation::softmax(&[1]);
        let y = act.fwd(x.view()).unwrap();
        let g = ArrayD::<f32>::ones(IxDyn(&[1, 3]));
        let dx = act.backward(x.view(), y.view(), g.view()).unwrap();
        assert!(dx.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn sigmoid_backward_matches_finite_difference() {
        let act = Activation::sigmoid();
        let x = array![0.7f32].into_dyn();
        let y = act.fwd(x.view()).unwrap();
        let g = array![1.0f32].into_dyn();
        let dx = act.backward(x.view(), y.view(), g.view()).unwrap();

        let h = 1e-3;
        let numeric = (sigmoid(0.7 + h) - sigmoid(0.7 - h)) / (2.0 * h);
        assert!((dx[[0]] - numeric).abs() < 1e-3);
    }
}
