use ndarray::{Array1, Array2, ArrayD, ArrayView2, ArrayViewD, ArrayViewMutD, Axis, Ix2};
use serde::{Deserialize, Serialize};

use super::initialization::{CompileOptions, WeightInit};
use super::traits::Layer;
use crate::activations::Activation;
use crate::error::{AurumError, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DenseParams {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

#[derive(Clone, Debug)]
struct DenseCache {
    inputs: Array2<f32>,
    pre_activation: Array2<f32>,
    outputs: Array2<f32>,
}

/// A fully connected (dense) layer: `activation(x · W + b)`.
///
/// Created uncompiled; `compile` fixes `W` to `(input_width, units)`.
#[derive(Clone, Debug)]
pub struct Dense {
    units: usize,
    activation: Activation,
    init: Option<WeightInit>,
    params: Option<DenseParams>,
    cache: Option<DenseCache>,
}

impl Dense {
    pub fn new(units: usize, activation: Activation) -> Self {
        Dense {
            units,
            activation,
            init: None,
            params: None,
            cache: None,
        }
    }

    /// Use `init` for this layer instead of the activation's default
    pub fn with_init(mut self, init: WeightInit) -> Self {
        self.init = Some(init);
        self
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn weights(&self) -> Option<&Array2<f32>> {
        self.params.as_ref().map(|p| &p.weights)
    }

    pub fn biases(&self) -> Option<&Array1<f32>> {
        self.params.as_ref().map(|p| &p.biases)
    }

    /// Replace the weights of a compiled layer. The shape must not change.
    pub fn set_weights(&mut self, weights: Array2<f32>) -> Result<()> {
        let params = self.params.as_mut().ok_or_else(|| AurumError::not_compiled("dense"))?;
        if weights.dim() != params.weights.dim() {
            return Err(AurumError::shape(
                format!("{:?}", params.weights.dim()),
                format!("{:?}", weights.dim()),
            ));
        }
        params.weights = weights;
        Ok(())
    }

    /// Replace the biases of a compiled layer. The shape must not change.
    pub fn set_biases(&mut self, biases: Array1<f32>) -> Result<()> {
        let params = self.params.as_mut().ok_or_else(|| AurumError::not_compiled("dense"))?;
        if biases.dim() != params.biases.dim() {
            return Err(AurumError::shape(
                format!("{:?}", params.biases.dim()),
                format!("{:?}", biases.dim()),
            ));
        }
        params.biases = biases;
        Ok(())
    }
}

impl Layer for Dense {
    fn kind(&self) -> &'static str {
        "dense"
    }

    fn compile(&mut self, input_shape: &[usize], options: &CompileOptions) -> Result<Vec<usize>> {
        let input_width = match input_shape {
            [width] if *width > 0 => *width,
            _ => {
                return Err(AurumError::shape(
                    "a single non-zero feature axis".to_string(),
                    format!("{:?}", input_shape),
                ))
            }
        };
        if self.units == 0 {
            return Err(AurumError::invalid_parameter(
                "units".to_string(),
                "a dense layer needs at least one unit".to_string(),
            ));
        }
        self.activation.compile(2)?;

        let init = options
            .init
            .clone()
            .or_else(|| self.init.clone())
            .unwrap_or_else(|| WeightInit::for_activation(&self.activation));
        let mut rng = options.rng();
        let weights = init.initialize_weights((input_width, self.units), &mut rng)?;
        let biases = init.initialize_biases(self.units, &mut rng)?;

        self.params = Some(DenseParams { weights, biases });
        self.cache = None;
        Ok(vec![self.units])
    }

    fn is_compiled(&self) -> bool {
        self.params.is_some()
    }

    fn fwd(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        let params = self.params.as_ref().ok_or_else(|| AurumError::not_compiled("dense"))?;
        if inputs.ncols() != params.weights.nrows() {
            return Err(AurumError::shape(
                format!("(batch, {})", params.weights.nrows()),
                format!("{:?}", inputs.dim()),
            ));
        }

        let pre_activation = inputs.dot(&params.weights) + &params.biases.view().insert_axis(Axis(0));
        let outputs = self
            .activation
            .fwd(pre_activation.view().into_dyn())?
            .into_dimensionality::<Ix2>()?;

        self.cache = Some(DenseCache {
            inputs: inputs.to_owned(),
            pre_activation,
            outputs: outputs.clone(),
        });
        Ok(outputs)
    }

    fn backward(&self, output_grad: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<ArrayD<f32>>)> {
        let params = self.params.as_ref().ok_or_else(|| AurumError::not_compiled("dense"))?;
        let cache = self.cache.as_ref().ok_or_else(|| {
            AurumError::invalid_parameter(
                "dense".to_string(),
                "backward called before fwd".to_string(),
            )
        })?;

        let adjusted = self
            .activation
            .backward(
                cache.pre_activation.view().into_dyn(),
                cache.outputs.view().into_dyn(),
                output_grad.into_dyn(),
            )?
            .into_dimensionality::<Ix2>()?;
        let weight_grads = cache.inputs.t().dot(&adjusted);
        let bias_grads = adjusted.sum_axis(Axis(0));
        let input_grads = adjusted.dot(&params.weights.t());

        Ok((input_grads, vec![weight_grads.into_dyn(), bias_grads.into_dyn()]))
    }

    fn learnables(&self) -> Vec<ArrayViewD<'_, f32>> {
        match &self.params {
            Some(p) => vec![p.weights.view().into_dyn(), p.biases.view().into_dyn()],
            None => Vec::new(),
        }
    }

    fn learnables_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        match &mut self.params {
            Some(DenseParams { weights, biases }) => {
                vec![weights.view_mut().into_dyn(), biases.view_mut().into_dyn()]
            }
            None => Vec::new(),
        }
    }

    fn output_shape(&self) -> Option<Vec<usize>> {
        self.params.as_ref().map(|_| vec![self.units])
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}
