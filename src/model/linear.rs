//! Dense output head
//!
//! `output = input * weights + bias`

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gradients of a [`Linear`] layer
#[derive(Debug, Clone)]
pub struct LinearGradients {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

/// Fully connected layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Linear {
    /// Weight matrix (input_size x output_size)
    pub weights: Array2<f32>,
    /// Bias vector (output_size)
    pub bias: Array1<f32>,
}

impl Linear {
    /// Kaiming-uniform weights (ReLU gain), bias uniform in `±1/sqrt(fan_in)`
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let fan_in = input_size.max(1) as f32;
        let weight_bound = (6.0 / fan_in).sqrt();
        let bias_bound = 1.0 / fan_in.sqrt();

        Self {
            weights: Array2::random_using(
                (input_size, output_size),
                Uniform::new_inclusive(-weight_bound, weight_bound),
                rng,
            ),
            bias: Array1::random_using(
                output_size,
                Uniform::new_inclusive(-bias_bound, bias_bound),
                rng,
            ),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.bias
    }

    /// Returns (input_gradient, parameter gradients)
    pub fn backward(
        &self,
        input: &Array2<f32>,
        output_gradient: &Array2<f32>,
    ) -> (Array2<f32>, LinearGradients) {
        let gradients = LinearGradients {
            weights: input.t().dot(output_gradient),
            bias: output_gradient.sum_axis(Axis(0)),
        };
        let input_gradient = output_gradient.dot(&self.weights.t());
        (input_gradient, gradients)
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}
