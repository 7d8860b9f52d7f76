//! GAT classifier
//!
//! Stack of attention convolutions with ReLU, global mean pooling and a
//! linear head producing one scalar per graph.

use super::gat_conv::{GatConv, GatConvCache, GatConvGradients};
use super::linear::{Linear, LinearGradients};
use super::optimizer::Optimizer;
use super::pooling::{global_mean_pool, global_mean_pool_backward};
use crate::data::GraphBatch;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shape of a [`GatClassifier`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Architecture {
    pub in_channels: usize,
    pub hidden_channels: usize,
    pub num_heads: usize,
    pub num_layers: usize,
}

impl Architecture {
    /// Width of every hidden representation (heads concatenated)
    pub fn hidden_dim(&self) -> usize {
        self.hidden_channels * self.num_heads
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0
            || self.hidden_channels == 0
            || self.num_heads == 0
            || self.num_layers == 0
        {
            return Err(Error::InvalidConfig(format!(
                "all architecture dimensions must be > 0: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Values saved by a training forward pass
pub struct ForwardCache {
    convs: Vec<GatConvCache>,
    /// Conv outputs before ReLU
    pre_activations: Vec<Array2<f32>>,
    pooled: Array2<f32>,
}

/// Gradients of every parameter
pub struct ModelGradients {
    pub convs: Vec<GatConvGradients>,
    pub head: LinearGradients,
}

/// Graph attention network with one scalar output per graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatClassifier {
    architecture: Architecture,
    convs: Vec<GatConv>,
    head: Linear,
}

impl GatClassifier {
    /// Freshly initialized model
    pub fn new<R: Rng + ?Sized>(architecture: Architecture, rng: &mut R) -> Result<Self> {
        architecture.validate()?;

        let hidden_dim = architecture.hidden_dim();
        let convs = (0..architecture.num_layers)
            .map(|i| {
                let in_channels = if i == 0 {
                    architecture.in_channels
                } else {
                    hidden_dim
                };
                GatConv::new(
                    in_channels,
                    architecture.hidden_channels,
                    architecture.num_heads,
                    rng,
                )
            })
            .collect();
        let head = Linear::new(hidden_dim, 1, rng);

        Ok(Self {
            architecture,
            convs,
            head,
        })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn layers(&self) -> &[GatConv] {
        &self.convs
    }

    pub fn num_parameters(&self) -> usize {
        self.convs.iter().map(GatConv::num_parameters).sum::<usize>() + self.head.num_parameters()
    }

    /// One prediction per graph of the batch
    pub fn forward(&self, batch: &GraphBatch) -> Result<Array1<f32>> {
        let mut h = batch.x.clone();
        for conv in &self.convs {
            h = conv.forward(&h, &batch.edges)?.mapv_into(relu);
        }
        let pooled = global_mean_pool(&h, &batch.graph_index, &batch.graph_sizes);
        Ok(self.head.forward(&pooled).index_axis_move(Axis(1), 0))
    }

    /// Forward pass keeping activations for [`GatClassifier::backward`]
    pub fn forward_train(&self, batch: &GraphBatch) -> Result<(Array1<f32>, ForwardCache)> {
        let mut convs = Vec::with_capacity(self.convs.len());
        let mut pre_activations = Vec::with_capacity(self.convs.len());

        let mut h = batch.x.clone();
        for conv in &self.convs {
            let (out, cache) = conv.forward_train(&h, &batch.edges)?;
            h = out.mapv(relu);
            convs.push(cache);
            pre_activations.push(out);
        }

        let pooled = global_mean_pool(&h, &batch.graph_index, &batch.graph_sizes);
        let output = self.head.forward(&pooled).index_axis_move(Axis(1), 0);

        Ok((
            output,
            ForwardCache {
                convs,
                pre_activations,
                pooled,
            },
        ))
    }

    /// Gradients of all parameters given dLoss/dOutput
    pub fn backward(
        &self,
        batch: &GraphBatch,
        cache: &ForwardCache,
        output_gradient: &Array1<f32>,
    ) -> ModelGradients {
        let grad = output_gradient.clone().insert_axis(Axis(1));
        let (d_pooled, head) = self.head.backward(&cache.pooled, &grad);
        let mut d_h = global_mean_pool_backward(&d_pooled, &batch.graph_index, &batch.graph_sizes);

        let mut convs = Vec::with_capacity(self.convs.len());
        for (i, conv) in self.convs.iter().enumerate().rev() {
            ndarray::Zip::from(&mut d_h)
                .and(&cache.pre_activations[i])
                .for_each(|d, &pre| {
                    if pre <= 0.0 {
                        *d = 0.0;
                    }
                });
            let (d_input, gradients) = conv.backward(&cache.convs[i], &batch.edges, &d_h, i > 0);
            convs.push(gradients);
            if let Some(d_input) = d_input {
                d_h = d_input;
            }
        }
        convs.reverse();

        ModelGradients { convs, head }
    }

    /// Hand every parameter and its gradient to the optimizer
    pub fn apply_gradients(&mut self, gradients: &ModelGradients, optimizer: &mut dyn Optimizer) {
        for (i, (conv, grads)) in self.convs.iter_mut().zip(&gradients.convs).enumerate() {
            let base = i * 4;
            optimizer.update_matrix(base, &mut conv.weights, &grads.weights);
            optimizer.update_matrix(base + 1, &mut conv.att_src, &grads.att_src);
            optimizer.update_matrix(base + 2, &mut conv.att_dst, &grads.att_dst);
            optimizer.update_vector(base + 3, &mut conv.bias, &grads.bias);
        }
        let base = self.convs.len() * 4;
        optimizer.update_matrix(base, &mut self.head.weights, &gradients.head.weights);
        optimizer.update_vector(base + 1, &mut self.head.bias, &gradients.head.bias);
    }
}

fn relu(x: f32) -> f32 {
    x.max(0.0)
}
