//! Gradient-based optimizers.
//!
//! An optimizer receives the policy's learnables (in `Policy::learnables`
//! order) together with one gradient per learnable and updates them in
//! place. Per-parameter state (moments) is keyed by that position, and is
//! (re)allocated whenever the parameter layout changes.

pub mod gradient_clipper;

use ndarray::{ArrayD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{AurumError, Result};

pub use gradient_clipper::GradientClipper;

pub trait Optimizer {
    /// Apply one update. Validates every shape before touching any parameter.
    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: &[ArrayD<f32>]) -> Result<()>;

    fn learning_rate(&self) -> f32;
}

fn check_layout(params: &[ArrayViewMutD<'_, f32>], grads: &[ArrayD<f32>]) -> Result<()> {
    if params.len() != grads.len() {
        return Err(AurumError::shape(
            format!("{} gradients", params.len()),
            format!("{} gradients", grads.len()),
        ));
    }
    for (i, (p, g)) in params.iter().zip(grads).enumerate() {
        if p.shape() != g.shape() {
            return Err(AurumError::shape(
                format!("learnable {} with shape {:?}", i, p.shape()),
                format!("{:?}", g.shape()),
            ));
        }
    }
    Ok(())
}

/// Returns true when the state had to be reallocated.
fn ensure_state(state: &mut Vec<ArrayD<f32>>, grads: &[ArrayD<f32>]) -> bool {
    let matches = state.len() == grads.len()
        && state.iter().zip(grads).all(|(s, g)| s.shape() == g.shape());
    if !matches {
        *state = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
    }
    !matches
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum OptimizerWrapper {
    Sgd(Sgd),
    Adam(Adam),
    RmsProp(RmsProp),
}

impl Default for OptimizerWrapper {
    fn default() -> Self {
        OptimizerWrapper::Adam(Adam::default())
    }
}

impl Optimizer for OptimizerWrapper {
    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: &[ArrayD<f32>]) -> Result<()> {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.step(params, grads),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(params, grads),
            OptimizerWrapper::RmsProp(optimizer) => optimizer.step(params, grads),
        }
    }

    fn learning_rate(&self) -> f32 {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.learning_rate(),
            OptimizerWrapper::Adam(optimizer) => optimizer.learning_rate(),
            OptimizerWrapper::RmsProp(optimizer) => optimizer.learning_rate(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Sgd { learning_rate }
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: &[ArrayD<f32>]) -> Result<()> {
        check_layout(&params, grads)?;
        let lr = self.learning_rate;
        for (mut p, g) in params.into_iter().zip(grads) {
            p.zip_mut_with(g, |w, &g| *w -= lr * g);
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    #[serde(skip)]
    m: Vec<ArrayD<f32>>,
    #[serde(skip)]
    v: Vec<ArrayD<f32>>,
    #[serde(skip)]
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(1e-3, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: &[ArrayD<f32>]) -> Result<()> {
        check_layout(&params, grads)?;
        let reallocated = ensure_state(&mut self.m, grads);
        if ensure_state(&mut self.v, grads) || reallocated {
            self.t = 0;
        }

        self.t += 1;
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let m_correction = 1.0 - b1.powi(self.t);
        let v_correction = 1.0 - b2.powi(self.t);

        for (i, (mut p, g)) in params.into_iter().zip(grads).enumerate() {
            let m = &mut self.m[i];
            let v = &mut self.v[i];
            Zip::from(&mut p)
                .and(m)
                .and(v)
                .and(g)
                .for_each(|w, m, v, &g| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / m_correction;
                    let v_hat = *v / v_correction;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

/// RMSProp optimizer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RmsProp {
    pub learning_rate: f32,
    pub beta: f32,
    pub epsilon: f32,
    #[serde(skip)]
    v: Vec<ArrayD<f32>>,
}

impl RmsProp {
    pub fn new(learning_rate: f32, beta: f32, epsilon: f32) -> Self {
        RmsProp {
            learning_rate,
            beta,
            epsilon,
            v: Vec::new(),
        }
    }
}

impl Default for RmsProp {
    fn default() -> Self {
        Self::new(1e-3, 0.9, 1e-8)
    }
}

impl Optimizer for RmsProp {
    fn step(&mut self, params: Vec<ArrayViewMutD<'_, f32>>, grads: &[ArrayD<f32>]) -> Result<()> {
        check_layout(&params, grads)?;
        ensure_state(&mut self.v, grads);

        let (beta, eps, lr) = (self.beta, self.epsilon, self.learning_rate);
        for (i, (mut p, g)) in params.into_iter().zip(grads).enumerate() {
            Zip::from(&mut p)
                .and(&mut self.v[i])
                .and(g)
                .for_each(|w, v, &g| {
                    *v = beta * *v + (1.0 - beta) * g * g;
                    *w -= lr * g / (v.sqrt() + eps);
                });
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD};

    fn quadratic_descent(mut optimizer: OptimizerWrapper) -> f32 {
        // minimise w^2 starting from w = 1
        let mut w = array![1.0f32].into_dyn();
        for _ in 0..200 {
            let grad = w.mapv(|x| 2.0 * x);
            optimizer.step(vec![w.view_mut()], &[grad]).unwrap();
        }
        w[[0]].abs()
    }

    #[test]
    fn every_optimizer_descends() {
        assert!(quadratic_descent(OptimizerWrapper::Sgd(Sgd::new(0.1))) < 1e-3);
        assert!(quadratic_descent(OptimizerWrapper::Adam(Adam::new(0.05, 0.9, 0.999, 1e-8))) < 0.1);
        assert!(quadratic_descent(OptimizerWrapper::RmsProp(RmsProp::new(0.01, 0.9, 1e-8))) < 0.1);
    }

    #[test]
    fn mismatched_gradient_leaves_parameters_untouched() {
        let mut w = array![[1.0f32, 2.0]].into_dyn();
        let bad = ArrayD::<f32>::ones(ndarray::IxDyn(&[3]));
        let mut sgd = Sgd::new(0.5);
        assert!(sgd.step(vec![w.view_mut()], &[bad]).is_err());
        assert_eq!(w, array![[1.0f32, 2.0]].into_dyn());
    }

    #[test]
    fn adam_counts_one_step_per_update() {
        let mut w = array![1.0f32, 1.0].into_dyn();
        let mut b = array![0.0f32].into_dyn();
        let mut adam = Adam::default();
        let grads = [array![0.1f32, 0.1].into_dyn(), array![0.1f32].into_dyn()];
        adam.step(vec![w.view_mut(), b.view_mut()], &grads).unwrap();
        adam.step(vec![w.view_mut(), b.view_mut()], &grads).unwrap();
        assert_eq!(adam.steps(), 2);
    }

    #[test]
    fn adam_restarts_bias_correction_when_shapes_change() {
        let mut adam = Adam::default();
        let mut w = array![1.0f32, 1.0].into_dyn();
        for _ in 0..3 {
            adam.step(vec![w.view_mut()], &[array![0.1f32, 0.1].into_dyn()]).unwrap();
        }
        assert_eq!(adam.steps(), 3);

        // same number of learnables, different shape
        let mut wider = array![1.0f32, 1.0, 1.0].into_dyn();
        adam.step(vec![wider.view_mut()], &[array![0.1f32, 0.1, 0.1].into_dyn()]).unwrap();
        assert_eq!(adam.steps(), 1);
        // first bias-corrected step moves each weight by about the learning rate
        assert!(wider.iter().all(|&x| (x - (1.0 - 1e-3)).abs() < 1e-5));
    }
}
