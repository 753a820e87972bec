use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::activations::Activation;
use crate::error::{AurumError, Result};
use crate::layers::{CompileOptions, Dense, Layer, WeightInit};
use crate::loss::{Loss, LossKind};
use crate::optimizer::{GradientClipper, Optimizer, OptimizerWrapper};

/// Builds the layer stack of a policy from the input width and action count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerBuilder {
    /// Dense hidden layers followed by a dense output layer with one unit per action
    FullyConnected {
        hidden: Vec<usize>,
        hidden_activation: Activation,
        output_activation: Activation,
    },
}

impl Default for LayerBuilder {
    fn default() -> Self {
        LayerBuilder::FullyConnected {
            hidden: vec![24, 24],
            hidden_activation: Activation::relu(),
            output_activation: Activation::linear(),
        }
    }
}

impl LayerBuilder {
    pub fn build(&self, num_actions: usize) -> Vec<Box<dyn Layer>> {
        match self {
            LayerBuilder::FullyConnected {
                hidden,
                hidden_activation,
                output_activation,
            } => {
                let mut layers: Vec<Box<dyn Layer>> = hidden
                    .iter()
                    .map(|&units| Box::new(Dense::new(units, hidden_activation.clone())) as Box<dyn Layer>)
                    .collect();
                layers.push(Box::new(Dense::new(num_actions, output_activation.clone())));
                layers
            }
        }
    }
}

/// Policy configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub loss: LossKind,
    pub optimizer: OptimizerWrapper,
    pub layer_builder: LayerBuilder,
    pub batch_size: usize,
    /// Report learn-step losses to the agent's tracker
    pub track: bool,
    pub clipper: GradientClipper,
    /// Initializer for every layer; each activation's default when unset
    pub init: Option<WeightInit>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            loss: LossKind::default(),
            optimizer: OptimizerWrapper::default(),
            layer_builder: LayerBuilder::default(),
            batch_size: 32,
            track: true,
            clipper: GradientClipper::default(),
            init: None,
        }
    }
}

/// Inputs and regression targets for one learn step
#[derive(Clone, Debug)]
pub struct Batch {
    pub inputs: Array2<f32>,
    pub targets: Array2<f32>,
}

impl Batch {
    pub fn new(inputs: Array2<f32>, targets: Array2<f32>) -> Result<Self> {
        if inputs.nrows() != targets.nrows() {
            return Err(AurumError::shape(
                format!("{} target rows", inputs.nrows()),
                format!("{} target rows", targets.nrows()),
            ));
        }
        Ok(Batch { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }
}

/// An ordered stack of layers with a loss and an optimizer.
///
/// Layers are evaluated in insertion order. `clone` deep-copies every
/// parameter, so a clone can serve as a target network.
#[derive(Clone, Debug)]
pub struct Policy {
    layers: Vec<Box<dyn Layer>>,
    loss: LossKind,
    optimizer: OptimizerWrapper,
    clipper: GradientClipper,
    batch_size: usize,
    track: bool,
    input_shape: Option<Vec<usize>>,
}

impl Policy {
    /// An empty, uncompiled policy using the loss, optimizer and flags of `config`.
    pub fn new(config: &PolicyConfig) -> Self {
        Policy {
            layers: Vec::new(),
            loss: config.loss.clone(),
            optimizer: config.optimizer.clone(),
            clipper: config.clipper.clone(),
            batch_size: config.batch_size,
            track: config.track,
            input_shape: None,
        }
    }

    /// Build the configured layer stack and compile it for `input_size` features.
    pub fn build(config: &PolicyConfig, input_size: usize, num_actions: usize, seed: Option<u64>) -> Result<Self> {
        let mut policy = Policy::new(config);
        for layer in config.layer_builder.build(num_actions) {
            policy.layers.push(layer);
        }
        let options = CompileOptions {
            init: config.init.clone(),
            seed,
        };
        policy.compile(&[input_size], &options)?;
        Ok(policy)
    }

    pub fn with_layer<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self.input_shape = None;
        self
    }

    /// Compile every layer in order, threading output shapes through.
    pub fn compile(&mut self, input_shape: &[usize], options: &CompileOptions) -> Result<Vec<usize>> {
        if self.layers.is_empty() {
            return Err(AurumError::invalid_parameter(
                "layers".to_string(),
                "a policy needs at least one layer".to_string(),
            ));
        }
        let mut shape = input_shape.to_vec();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            shape = layer.compile(&shape, &options.for_layer(i))?;
        }
        self.input_shape = Some(input_shape.to_vec());
        Ok(shape)
    }

    /// Forward pass for a single state
    pub fn fwd(&mut self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let outputs = self.fwd_batch(state.insert_axis(Axis(0)))?;
        Ok(outputs.index_axis_move(Axis(0), 0))
    }

    /// Forward pass for a batch of states, one per row
    pub fn fwd_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (first, rest) = self
            .layers
            .split_first_mut()
            .ok_or_else(|| AurumError::not_compiled("policy"))?;
        let mut current = first.fwd(inputs)?;
        for layer in rest {
            current = layer.fwd(current.view())?;
        }
        Ok(current)
    }

    /// One optimization step on `batch`. Returns the loss before the update.
    ///
    /// Gradients are computed and checked in full before any parameter is
    /// written, so a failed step leaves the policy unchanged.
    pub fn learn(&mut self, batch: &Batch) -> Result<f32> {
        if batch.is_empty() {
            return Err(AurumError::EmptyBatch);
        }

        let predictions = self.fwd_batch(batch.inputs.view())?;
        if predictions.dim() != batch.targets.dim() {
            return Err(AurumError::shape(
                format!("targets {:?}", predictions.dim()),
                format!("{:?}", batch.targets.dim()),
            ));
        }

        let loss = self.loss.compute_batch(predictions.view(), batch.targets.view());
        if !loss.is_finite() {
            return Err(AurumError::Numerical(format!("loss is {}", loss)));
        }

        let mut error = self.loss.gradient_batch(predictions.view(), batch.targets.view());
        let mut per_layer = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter().rev() {
            let (input_grads, grads) = layer.backward(error.view())?;
            per_layer.push(grads);
            error = input_grads;
        }
        per_layer.reverse();

        let mut grads: Vec<ArrayD<f32>> = per_layer.into_iter().flatten().collect();
        if grads.iter().any(|g| g.iter().any(|v| !v.is_finite())) {
            return Err(AurumError::Numerical("non-finite gradient".to_string()));
        }
        self.clipper.clip(&mut grads);

        let params: Vec<ArrayViewMutD<'_, f32>> =
            self.layers.iter_mut().flat_map(|layer| layer.learnables_mut()).collect();
        self.optimizer.step(params, &grads)?;

        Ok(loss)
    }

    /// All learnables, layer by layer, in evaluation order
    pub fn learnables(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.layers.iter().flat_map(|layer| layer.learnables()).collect()
    }

    pub fn learnables_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.layers.iter_mut().flat_map(|layer| layer.learnables_mut()).collect()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn tracks(&self) -> bool {
        self.track
    }

    pub fn is_compiled(&self) -> bool {
        self.input_shape.is_some() && self.layers.iter().all(|l| l.is_compiled())
    }

    /// Width of the policy output (one value per action for Q-networks)
    pub fn output_size(&self) -> Option<usize> {
        self.layers
            .last()
            .and_then(|l| l.output_shape())
            .map(|shape| shape.iter().product())
    }

    /// Human-readable description of the layer graph
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "policy: loss={:?} lr={} batch_size={} input={:?}",
            self.loss,
            self.optimizer.learning_rate(),
            self.batch_size,
            self.input_shape
        );
        for (i, layer) in self.layers.iter().enumerate() {
            let params: usize = layer.learnables().iter().map(|p| p.len()).sum();
            let _ = writeln!(
                out,
                "  [{}] {} -> {:?} ({} params)",
                i,
                layer.kind(),
                layer.output_shape(),
                params
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Sgd;
    use ndarray::array;

    fn regression_policy() -> Policy {
        let config = PolicyConfig {
            optimizer: OptimizerWrapper::Sgd(Sgd::new(0.3)),
            layer_builder: LayerBuilder::FullyConnected {
                hidden: vec![],
                hidden_activation: Activation::relu(),
                output_activation: Activation::linear(),
            },
            ..PolicyConfig::default()
        };
        Policy::build(&config, 2, 1, Some(7)).unwrap()
    }

    #[test]
    fn learn_reduces_loss_on_a_linear_target() {
        let mut policy = regression_policy();
        let inputs = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let targets = array![[2.0], [-1.0], [1.0]];
        let batch = Batch::new(inputs, targets).unwrap();

        let first = policy.learn(&batch).unwrap();
        let mut last = first;
        for _ in 0..300 {
            last = policy.learn(&batch).unwrap();
        }
        assert!(last < first);
        assert!(last < 0.05);
    }

    #[test]
    fn mismatched_targets_do_not_touch_parameters() {
        let mut policy = regression_policy();
        let before: Vec<_> = policy.learnables().iter().map(|p| p.to_owned()).collect();
        let batch = Batch::new(array![[1.0, 0.0]], array![[1.0, 2.0]]).unwrap();

        assert!(matches!(policy.learn(&batch), Err(AurumError::Shape { .. })));
        let after: Vec<_> = policy.learnables().iter().map(|p| p.to_owned()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn summary_lists_every_layer() {
        let policy = Policy::build(&PolicyConfig::default(), 4, 2, Some(1)).unwrap();
        let summary = policy.summary();
        assert_eq!(summary.lines().count(), 4);
        assert!(summary.contains("(50 params)"));
    }
}
