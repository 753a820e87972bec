//! # Activation Functions Module
//!
//! The forward transforms a layer applies after its affine step.
//!
//! ## Available Activations
//!
//! - **Sigmoid**: `1 / (1 + e^(-x))` - Outputs between 0 and 1
//! - **Tanh**: Hyperbolic tangent - Outputs between -1 and 1
//! - **ReLU**: `max(0, x)`
//! - **LeakyReLU**: `x` if positive, else `alpha * x` (default alpha 0.01)
//! - **Softmax**: `exp(x) / sum(exp(x))` along an explicit axis-set
//! - **Linear**: Identity function
//!
//! Every constructor returns a fresh value, so two layers never share an
//! activation instance.
//!
//! ## Usage Example
//!
//! ```rust
//! use aurum::activations::Activation;
//! use ndarray::array;
//!
//! let relu = Activation::relu();
//! let y = relu.fwd(array![1.0, -0.5, 0.0, 2.0].into_dyn().view()).unwrap();
//! assert_eq!(y.as_slice().unwrap(), &[1.0, 0.0, 0.0, 2.0]);
//!
//! // Softmax over the feature axis of a (batch, features) array
//! let softmax = Activation::softmax(&[1]);
//! let p = softmax.fwd(array![[0.0, 0.0]].into_dyn().view()).unwrap();
//! assert_eq!(p[[0, 0]], 0.5);
//! ```

pub mod functions;

pub use functions::{Activation, DEFAULT_LEAKY_ALPHA};
