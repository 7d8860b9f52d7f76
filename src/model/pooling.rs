//! Global mean pooling: one row per graph, averaged over its nodes

use ndarray::{Array2, Axis};

/// Average node rows per graph
pub fn global_mean_pool(x: &Array2<f32>, graph_index: &[usize], graph_sizes: &[usize]) -> Array2<f32> {
    let mut pooled = Array2::<f32>::zeros((graph_sizes.len(), x.ncols()));
    for (row, &g) in x.axis_iter(Axis(0)).zip(graph_index) {
        let mut target = pooled.row_mut(g);
        target += &row;
    }
    for (mut row, &size) in pooled.axis_iter_mut(Axis(0)).zip(graph_sizes) {
        if size > 0 {
            row /= size as f32;
        }
    }
    pooled
}

/// Spread pooled gradients back to nodes
pub fn global_mean_pool_backward(
    grad: &Array2<f32>,
    graph_index: &[usize],
    graph_sizes: &[usize],
) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((graph_index.len(), grad.ncols()));
    for (mut row, &g) in out.axis_iter_mut(Axis(0)).zip(graph_index) {
        row.assign(&grad.row(g));
        row /= graph_sizes[g] as f32;
    }
    out
}
