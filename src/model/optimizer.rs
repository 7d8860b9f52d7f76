//! Optimization Algorithms
//!
//! Parameters are addressed by a slot id chosen by the model, so one
//! optimizer instance keeps separate moment estimates for every tensor.

use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Optimizer trait for parameter updates
pub trait Optimizer {
    /// Update a matrix parameter given its gradient
    fn update_matrix(&mut self, slot: usize, param: &mut Array2<f32>, grad: &Array2<f32>);

    /// Update a vector parameter given its gradient
    fn update_vector(&mut self, slot: usize, param: &mut Array1<f32>, grad: &Array1<f32>);

    /// Current learning rate
    fn learning_rate(&self) -> f64;

    /// Change the learning rate without touching optimizer state
    fn set_learning_rate(&mut self, learning_rate: f64);

    /// Reset optimizer state (for new training run)
    fn reset(&mut self);
}

/// Running moment estimates for one tensor
#[derive(Clone)]
struct Moments<D: Dimension> {
    m: Array<f32, D>,
    v: Array<f32, D>,
    step: i32,
}

impl<D: Dimension> Moments<D> {
    fn zeros(dim: D) -> Self {
        Self {
            m: Array::zeros(dim.clone()),
            v: Array::zeros(dim),
            step: 0,
        }
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Clone, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    #[serde(skip)]
    matrices: HashMap<usize, Moments<ndarray::Ix2>>,
    #[serde(skip)]
    vectors: HashMap<usize, Moments<ndarray::Ix1>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            matrices: HashMap::new(),
            vectors: HashMap::new(),
        }
    }

    fn apply<D: Dimension>(
        &self,
        state: &mut Moments<D>,
        param: &mut Array<f32, D>,
        grad: &Array<f32, D>,
    ) {
        state.step += 1;

        let beta1 = self.beta1 as f32;
        let beta2 = self.beta2 as f32;

        // Update biased first and second moment estimates
        state
            .m
            .zip_mut_with(grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        state
            .v
            .zip_mut_with(grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        // Bias corrections
        let correction1 = 1.0 - beta1.powi(state.step);
        let correction2 = 1.0 - beta2.powi(state.step);
        let lr = self.learning_rate as f32;
        let eps = self.epsilon as f32;

        Zip::from(param)
            .and(&state.m)
            .and(&state.v)
            .for_each(|p, &m, &v| {
                *p -= lr * (m / correction1) / ((v / correction2).sqrt() + eps);
            });
    }
}

impl Optimizer for Adam {
    fn update_matrix(&mut self, slot: usize, param: &mut Array2<f32>, grad: &Array2<f32>) {
        let mut state = self
            .matrices
            .remove(&slot)
            .filter(|s| s.m.dim() == param.dim())
            .unwrap_or_else(|| Moments::zeros(param.raw_dim()));
        self.apply(&mut state, param, grad);
        self.matrices.insert(slot, state);
    }

    fn update_vector(&mut self, slot: usize, param: &mut Array1<f32>, grad: &Array1<f32>) {
        let mut state = self
            .vectors
            .remove(&slot)
            .filter(|s| s.m.dim() == param.dim())
            .unwrap_or_else(|| Moments::zeros(param.raw_dim()));
        self.apply(&mut state, param, grad);
        self.vectors.insert(slot, state);
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    fn reset(&mut self) {
        self.matrices.clear();
        self.vectors.clear();
    }
}
