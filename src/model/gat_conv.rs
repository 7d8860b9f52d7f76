//! Graph attention convolution
//!
//! Multi-head GAT layer with concatenated heads. For an edge j -> i and head h:
//!
//! ```text
//! z       = x W
//! s_ij    = <a_src[h], z_j[h]> + <a_dst[h], z_i[h]>
//! alpha_ij = softmax_j(LeakyReLU(s_ij))          over incoming edges of i
//! out_i[h] = sum_j alpha_ij z_j[h] + b[h]
//! ```
//!
//! Every node attends to itself through the self loop added at batching.

use crate::data::IncomingEdges;
use crate::error::{Error, Result};
use ndarray::{s, Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Values saved by a training forward pass
#[derive(Debug, Clone)]
pub struct GatConvCache {
    input: Array2<f32>,
    projected: Array2<f32>,
    /// Pre-activation attention logits (edges x heads)
    scores: Array2<f32>,
    /// Normalized attention (edges x heads)
    attention: Array2<f32>,
}

/// Gradients of a [`GatConv`] layer
#[derive(Debug, Clone)]
pub struct GatConvGradients {
    pub weights: Array2<f32>,
    pub att_src: Array2<f32>,
    pub att_dst: Array2<f32>,
    pub bias: Array1<f32>,
}

/// Graph attention convolution layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatConv {
    /// Projection (in_channels x heads * out_channels)
    pub weights: Array2<f32>,
    /// Source attention vectors (heads x out_channels)
    pub att_src: Array2<f32>,
    /// Target attention vectors (heads x out_channels)
    pub att_dst: Array2<f32>,
    /// Bias (heads * out_channels)
    pub bias: Array1<f32>,
    num_heads: usize,
    out_channels: usize,
    negative_slope: f32,
}

impl GatConv {
    /// Glorot-initialized layer with zero bias
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        num_heads: usize,
        rng: &mut R,
    ) -> Self {
        let width = num_heads * out_channels;
        let w_bound = (6.0 / (in_channels + width).max(1) as f32).sqrt();
        let a_bound = (6.0 / (num_heads + out_channels).max(1) as f32).sqrt();

        Self {
            weights: Array2::random_using(
                (in_channels, width),
                Uniform::new_inclusive(-w_bound, w_bound),
                rng,
            ),
            att_src: Array2::random_using(
                (num_heads, out_channels),
                Uniform::new_inclusive(-a_bound, a_bound),
                rng,
            ),
            att_dst: Array2::random_using(
                (num_heads, out_channels),
                Uniform::new_inclusive(-a_bound, a_bound),
                rng,
            ),
            bias: Array1::zeros(width),
            num_heads,
            out_channels,
            negative_slope: 0.2,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.weights.nrows()
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Width of the concatenated output
    pub fn output_dim(&self) -> usize {
        self.num_heads * self.out_channels
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.att_src.len() + self.att_dst.len() + self.bias.len()
    }

    fn head_cols(&self, head: usize) -> Range<usize> {
        head * self.out_channels..(head + 1) * self.out_channels
    }

    fn check_input(&self, x: &Array2<f32>, edges: &IncomingEdges) -> Result<()> {
        if x.ncols() != self.in_channels() {
            return Err(Error::ArchitectureMismatch(format!(
                "GAT layer expects {} input features, got {}",
                self.in_channels(),
                x.ncols()
            )));
        }
        if x.nrows() != edges.num_nodes() {
            return Err(Error::ArchitectureMismatch(format!(
                "{} feature rows for a graph of {} nodes",
                x.nrows(),
                edges.num_nodes()
            )));
        }
        Ok(())
    }

    /// Inference forward pass
    pub fn forward(&self, x: &Array2<f32>, edges: &IncomingEdges) -> Result<Array2<f32>> {
        self.check_input(x, edges)?;
        let (output, _, _, _) = self.propagate(x, edges);
        Ok(output)
    }

    /// Training forward pass keeping what backward needs
    pub fn forward_train(
        &self,
        x: &Array2<f32>,
        edges: &IncomingEdges,
    ) -> Result<(Array2<f32>, GatConvCache)> {
        self.check_input(x, edges)?;
        let (output, projected, scores, attention) = self.propagate(x, edges);
        let cache = GatConvCache {
            input: x.clone(),
            projected,
            scores,
            attention,
        };
        Ok((output, cache))
    }

    /// Normalized attention per edge and head
    pub fn attention_weights(&self, x: &Array2<f32>, edges: &IncomingEdges) -> Result<Array2<f32>> {
        self.check_input(x, edges)?;
        let (_, _, _, attention) = self.propagate(x, edges);
        Ok(attention)
    }

    fn propagate(
        &self,
        x: &Array2<f32>,
        edges: &IncomingEdges,
    ) -> (Array2<f32>, Array2<f32>, Array2<f32>, Array2<f32>) {
        let n = x.nrows();
        let heads = self.num_heads;
        let projected = x.dot(&self.weights);

        // Per-node halves of the attention logit
        let mut alpha_src = Array2::<f32>::zeros((n, heads));
        let mut alpha_dst = Array2::<f32>::zeros((n, heads));
        for h in 0..heads {
            let zh = projected.slice(s![.., self.head_cols(h)]);
            alpha_src.column_mut(h).assign(&zh.dot(&self.att_src.row(h)));
            alpha_dst.column_mut(h).assign(&zh.dot(&self.att_dst.row(h)));
        }

        let mut scores = Array2::<f32>::zeros((edges.num_edges(), heads));
        let mut attention = Array2::<f32>::zeros((edges.num_edges(), heads));
        let mut output = Array2::<f32>::zeros((n, self.output_dim()));

        for i in 0..n {
            let range = edges.range(i);
            for h in 0..heads {
                let mut max = f32::NEG_INFINITY;
                for k in range.clone() {
                    let score = alpha_src[[edges.source(k), h]] + alpha_dst[[i, h]];
                    scores[[k, h]] = score;
                    let activated = leaky_relu(score, self.negative_slope);
                    attention[[k, h]] = activated;
                    max = max.max(activated);
                }

                let mut total = 0.0;
                for k in range.clone() {
                    let e = (attention[[k, h]] - max).exp();
                    attention[[k, h]] = e;
                    total += e;
                }

                let cols = self.head_cols(h);
                let mut out_row = output.slice_mut(s![i, cols.clone()]);
                for k in range.clone() {
                    attention[[k, h]] /= total;
                    out_row.scaled_add(
                        attention[[k, h]],
                        &projected.slice(s![edges.source(k), cols.clone()]),
                    );
                }
            }
        }

        output += &self.bias;
        (output, projected, scores, attention)
    }

    /// Backward pass
    ///
    /// Returns the input gradient (when requested) and parameter gradients.
    pub fn backward(
        &self,
        cache: &GatConvCache,
        edges: &IncomingEdges,
        output_gradient: &Array2<f32>,
        need_input_gradient: bool,
    ) -> (Option<Array2<f32>>, GatConvGradients) {
        let n = cache.input.nrows();
        let heads = self.num_heads;

        let bias = output_gradient.sum_axis(Axis(0));
        let mut d_projected = Array2::<f32>::zeros((n, self.output_dim()));
        let mut d_alpha_src = Array2::<f32>::zeros((n, heads));
        let mut d_alpha_dst = Array2::<f32>::zeros((n, heads));
        let mut d_attention: Vec<f32> = Vec::new();

        for i in 0..n {
            let range = edges.range(i);
            for h in 0..heads {
                let cols = self.head_cols(h);
                let grad = output_gradient.slice(s![i, cols.clone()]);

                // Message path: out_i = sum_j alpha_ij z_j
                d_attention.clear();
                for k in range.clone() {
                    let j = edges.source(k);
                    d_projected
                        .slice_mut(s![j, cols.clone()])
                        .scaled_add(cache.attention[[k, h]], &grad);
                    d_attention.push(grad.dot(&cache.projected.slice(s![j, cols.clone()])));
                }

                // Softmax, then LeakyReLU
                let weighted: f32 = range
                    .clone()
                    .zip(&d_attention)
                    .map(|(k, &da)| cache.attention[[k, h]] * da)
                    .sum();
                for (k, &da) in range.clone().zip(&d_attention) {
                    let d_activated = cache.attention[[k, h]] * (da - weighted);
                    let d_score = if cache.scores[[k, h]] > 0.0 {
                        d_activated
                    } else {
                        d_activated * self.negative_slope
                    };
                    d_alpha_src[[edges.source(k), h]] += d_score;
                    d_alpha_dst[[i, h]] += d_score;
                }
            }
        }

        let mut att_src = Array2::<f32>::zeros(self.att_src.raw_dim());
        let mut att_dst = Array2::<f32>::zeros(self.att_dst.raw_dim());
        for h in 0..heads {
            let cols = self.head_cols(h);
            let zh = cache.projected.slice(s![.., cols.clone()]);
            att_src.row_mut(h).assign(&d_alpha_src.column(h).dot(&zh));
            att_dst.row_mut(h).assign(&d_alpha_dst.column(h).dot(&zh));

            let through_src = d_alpha_src
                .column(h)
                .insert_axis(Axis(1))
                .dot(&self.att_src.row(h).insert_axis(Axis(0)));
            let through_dst = d_alpha_dst
                .column(h)
                .insert_axis(Axis(1))
                .dot(&self.att_dst.row(h).insert_axis(Axis(0)));
            let mut d_head = d_projected.slice_mut(s![.., cols]);
            d_head += &through_src;
            d_head += &through_dst;
        }

        let gradients = GatConvGradients {
            weights: cache.input.t().dot(&d_projected),
            att_src,
            att_dst,
            bias,
        };
        let input_gradient = need_input_gradient.then(|| d_projected.dot(&self.weights.t()));

        (input_gradient, gradients)
    }
}

fn leaky_relu(x: f32, negative_slope: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        negative_slope * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (GatConv, Array2<f32>, IncomingEdges, Array2<f32>) {
        let mut rng = StdRng::seed_from_u64(42);
        let mut conv = GatConv::new(3, 2, 2, &mut rng);
        conv.bias = Array1::random_using(4, Uniform::new(-0.5, 0.5), &mut rng);
        let x = Array2::random_using((4, 3), Uniform::new(-1.0, 1.0), &mut rng);
        let edges = IncomingEdges::with_self_loops(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]);
        let probe = Array2::random_using((4, 4), Uniform::new(-1.0, 1.0), &mut rng);
        (conv, x, edges, probe)
    }

    fn probe_loss(conv: &GatConv, x: &Array2<f32>, edges: &IncomingEdges, probe: &Array2<f32>) -> f32 {
        (&conv.forward(x, edges).unwrap() * probe).sum()
    }

    fn assert_close(numeric: f32, analytic: f32) {
        assert!(
            (numeric - analytic).abs() < 1e-2 * (1.0 + analytic.abs()),
            "numeric {} vs analytic {}",
            numeric,
            analytic
        );
    }

    #[test]
    fn test_output_shape() {
        let (conv, x, edges, _) = setup();
        let out = conv.forward(&x, &edges).unwrap();
        assert_eq!(out.dim(), (4, 4));
        assert_eq!(conv.output_dim(), 4);
        assert_eq!(conv.num_parameters(), 3 * 4 + 4 + 4 + 4);
    }

    #[test]
    fn test_attention_sums_to_one_per_target() {
        let (conv, x, edges, _) = setup();
        let attention = conv.attention_weights(&x, &edges).unwrap();
        for i in 0..4 {
            for h in 0..2 {
                let total: f32 = edges.range(i).map(|k| attention[[k, h]]).sum();
                assert!((total - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_isolated_node_returns_own_projection() {
        let (conv, x, _, _) = setup();
        let edges = IncomingEdges::with_self_loops(4, &[]);
        let out = conv.forward(&x, &edges).unwrap();
        let expected = x.dot(&conv.weights) + &conv.bias;
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (conv, _, edges, _) = setup();
        let x = Array2::zeros((4, 5));
        assert!(matches!(
            conv.forward(&x, &edges),
            Err(Error::ArchitectureMismatch(_))
        ));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let (conv, x, edges, probe) = setup();
        let (_, cache) = conv.forward_train(&x, &edges).unwrap();
        let (input_grad, grads) = conv.backward(&cache, &edges, &probe, true);
        let input_grad = input_grad.unwrap();
        let eps = 1e-3;

        for &(r, c) in &[(0, 0), (1, 3), (2, 1)] {
            let mut plus = conv.clone();
            plus.weights[[r, c]] += eps;
            let mut minus = conv.clone();
            minus.weights[[r, c]] -= eps;
            let numeric = (probe_loss(&plus, &x, &edges, &probe)
                - probe_loss(&minus, &x, &edges, &probe))
                / (2.0 * eps);
            assert_close(numeric, grads.weights[[r, c]]);
        }

        for h in 0..2 {
            for c in 0..2 {
                let mut plus = conv.clone();
                plus.att_src[[h, c]] += eps;
                let mut minus = conv.clone();
                minus.att_src[[h, c]] -= eps;
                let numeric = (probe_loss(&plus, &x, &edges, &probe)
                    - probe_loss(&minus, &x, &edges, &probe))
                    / (2.0 * eps);
                assert_close(numeric, grads.att_src[[h, c]]);

                let mut plus = conv.clone();
                plus.att_dst[[h, c]] += eps;
                let mut minus = conv.clone();
                minus.att_dst[[h, c]] -= eps;
                let numeric = (probe_loss(&plus, &x, &edges, &probe)
                    - probe_loss(&minus, &x, &edges, &probe))
                    / (2.0 * eps);
                assert_close(numeric, grads.att_dst[[h, c]]);
            }
        }

        for &(r, c) in &[(0, 2), (3, 0)] {
            let mut plus = x.clone();
            plus[[r, c]] += eps;
            let mut minus = x.clone();
            minus[[r, c]] -= eps;
            let numeric = (probe_loss(&conv, &plus, &edges, &probe)
                - probe_loss(&conv, &minus, &edges, &probe))
                / (2.0 * eps);
            assert_close(numeric, input_grad[[r, c]]);
        }

        let column_sums = probe.sum_axis(Axis(0));
        for (a, b) in grads.bias.iter().zip(column_sums.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
