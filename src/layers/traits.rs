use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, ArrayViewMutD};
use std::fmt;

use super::initialization::CompileOptions;
use crate::error::Result;

/// Trait defining the interface for policy network layers.
///
/// Implemented by [`Dense`](super::Dense) and
/// [`ActivationLayer`](super::ActivationLayer). Layers take a batch of
/// rows `(batch, features)` and cache what the matching `backward` needs.
pub trait Layer: Send + Sync + fmt::Debug {
    /// Short type name used in summaries and errors
    fn kind(&self) -> &'static str;

    /// Fix parameter shapes for `input_shape` (batch axis excluded) and
    /// initialize them. Returns the output shape.
    fn compile(&mut self, input_shape: &[usize], options: &CompileOptions) -> Result<Vec<usize>>;

    /// Whether `compile` has run
    fn is_compiled(&self) -> bool;

    /// Forward pass for a batch of inputs
    fn fwd(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Backward pass for the last `fwd` call. Returns the gradient w.r.t.
    /// the layer input and one gradient per learnable, in `learnables` order.
    fn backward(&self, output_grad: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<ArrayD<f32>>)>;

    /// Learnable parameters, order-stable
    fn learnables(&self) -> Vec<ArrayViewD<'_, f32>>;

    /// Mutable handles to the learnable parameters, same order as `learnables`
    fn learnables_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// Output shape after compile (batch axis excluded)
    fn output_shape(&self) -> Option<Vec<usize>>;

    /// Clone the layer into a boxed trait object. Parameters are deep-copied.
    fn clone_box(&self) -> Box<dyn Layer>;
}

impl Clone for Box<dyn Layer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
