//! Policy network layers.
//!
//! Two implementations of [`Layer`]: [`Dense`] (affine transform followed by
//! an activation) and [`ActivationLayer`] (an activation on its own).
//! Layers start uncompiled; [`Layer::compile`] fixes parameter shapes from
//! the input shape and initializes them with a [`WeightInit`].

pub mod activation;
pub mod dense;
pub mod initialization;
pub mod traits;

pub use activation::ActivationLayer;
pub use dense::Dense;
pub use initialization::{CompileOptions, WeightInit};
pub use traits::Layer;
