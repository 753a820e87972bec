use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, ArrayViewMutD, Ix2};

use super::initialization::CompileOptions;
use super::traits::Layer;
use crate::activations::Activation;
use crate::error::{AurumError, Result};

/// A bare activation placed in a layer stack. Shape-preserving, no learnables.
#[derive(Clone, Debug)]
pub struct ActivationLayer {
    activation: Activation,
    shape: Option<Vec<usize>>,
    cache: Option<(Array2<f32>, Array2<f32>)>,
}

impl ActivationLayer {
    pub fn new(activation: Activation) -> Self {
        ActivationLayer {
            activation,
            shape: None,
            cache: None,
        }
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }
}

impl Layer for ActivationLayer {
    fn kind(&self) -> &'static str {
        self.activation.name()
    }

    fn compile(&mut self, input_shape: &[usize], _options: &CompileOptions) -> Result<Vec<usize>> {
        match input_shape {
            [width] if *width > 0 => {}
            _ => {
                return Err(AurumError::shape(
                    "a single non-zero feature axis".to_string(),
                    format!("{:?}", input_shape),
                ))
            }
        }
        // fwd always sees (batch, features)
        self.activation.compile(2)?;
        self.shape = Some(input_shape.to_vec());
        Ok(input_shape.to_vec())
    }

    fn is_compiled(&self) -> bool {
        self.shape.is_some()
    }

    fn fwd(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        let shape = self
            .shape
            .as_ref()
            .ok_or_else(|| AurumError::not_compiled(self.activation.name()))?;
        if shape[..] != [inputs.ncols()] {
            return Err(AurumError::shape(
                format!("(batch, {:?})", shape),
                format!("{:?}", inputs.dim()),
            ));
        }

        let outputs = self
            .activation
            .fwd(inputs.into_dyn())?
            .into_dimensionality::<Ix2>()?;
        self.cache = Some((inputs.to_owned(), outputs.clone()));
        Ok(outputs)
    }

    fn backward(&self, output_grad: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<ArrayD<f32>>)> {
        let (inputs, outputs) = self.cache.as_ref().ok_or_else(|| {
            AurumError::invalid_parameter(
                self.activation.name().to_string(),
                "backward called before fwd".to_string(),
            )
        })?;
        let input_grads = self
            .activation
            .backward(inputs.view().into_dyn(), outputs.view().into_dyn(), output_grad.into_dyn())?
            .into_dimensionality::<Ix2>()?;
        Ok((input_grads, Vec::new()))
    }

    fn learnables(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.activation.learnables()
    }

    fn learnables_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        Vec::new()
    }

    fn output_shape(&self) -> Option<Vec<usize>> {
        self.shape.clone()
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}
