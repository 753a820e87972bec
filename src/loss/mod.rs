//! Loss functions for the policy learn step.

pub mod functions;

pub use functions::{CrossEntropy, Huber, Loss, LossKind, Mse};
