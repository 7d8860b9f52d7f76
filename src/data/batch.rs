//! Mini-batching of graphs
//!
//! Several graphs are merged into one disconnected graph: node features are
//! stacked, edges are offset per graph and every node gets a self loop.
//! Incoming edges are kept in CSR order so attention can be normalized per
//! target node.

use super::graph::GraphSample;
use super::loader::Dataset;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Incoming edges grouped by target node (CSR)
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEdges {
    /// `ptr[i]..ptr[i + 1]` is the edge range of target node `i`
    ptr: Vec<usize>,
    /// Source node of each edge
    sources: Vec<usize>,
}

impl IncomingEdges {
    /// Build from (source, target) pairs; existing self loops are replaced
    /// by exactly one self loop per node
    pub fn with_self_loops(num_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for &(src, dst) in edges {
            if src != dst {
                incoming[dst].push(src);
            }
        }

        let mut ptr = Vec::with_capacity(num_nodes + 1);
        let mut sources = Vec::with_capacity(edges.len() + num_nodes);
        ptr.push(0);
        for (node, mut srcs) in incoming.into_iter().enumerate() {
            srcs.push(node);
            sources.extend(srcs);
            ptr.push(sources.len());
        }

        Self { ptr, sources }
    }

    pub fn num_nodes(&self) -> usize {
        self.ptr.len() - 1
    }

    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }

    /// Edge id range of a target node
    pub fn range(&self, target: usize) -> std::ops::Range<usize> {
        self.ptr[target]..self.ptr[target + 1]
    }

    /// Source nodes of a target node
    pub fn sources_of(&self, target: usize) -> &[usize] {
        &self.sources[self.range(target)]
    }

    /// Source node of an edge id
    pub fn source(&self, edge: usize) -> usize {
        self.sources[edge]
    }
}

/// Several graphs collated into one disconnected graph
#[derive(Debug, Clone)]
pub struct GraphBatch {
    /// Stacked node features
    pub x: Array2<f32>,
    /// Incoming edges with self loops
    pub edges: IncomingEdges,
    /// Graph id of every node
    pub graph_index: Vec<usize>,
    /// Node count per graph
    pub graph_sizes: Vec<usize>,
    /// One target per graph
    pub targets: Array1<f32>,
}

impl GraphBatch {
    /// Merge samples into one batch
    pub fn collate<'a, I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a GraphSample>,
    {
        let samples: Vec<&GraphSample> = samples.into_iter().collect();
        if samples.is_empty() {
            return Err(Error::InsufficientData("cannot collate an empty batch".into()));
        }

        let views: Vec<ArrayView2<f32>> = samples.iter().map(|s| s.features().view()).collect();
        let x = ndarray::concatenate(Axis(0), &views)?;

        let mut edges = Vec::new();
        let mut graph_index = Vec::with_capacity(x.nrows());
        let mut graph_sizes = Vec::with_capacity(samples.len());
        let mut offset = 0;
        for (g, sample) in samples.iter().enumerate() {
            let n = sample.num_nodes();
            edges.extend(
                sample
                    .edges()
                    .iter()
                    .map(|&(src, dst)| (src + offset, dst + offset)),
            );
            graph_index.extend(std::iter::repeat(g).take(n));
            graph_sizes.push(n);
            offset += n;
        }

        let targets = samples.iter().map(|s| s.target()).collect();

        Ok(Self {
            edges: IncomingEdges::with_self_loops(x.nrows(), &edges),
            x,
            graph_index,
            graph_sizes,
            targets,
        })
    }

    pub fn num_graphs(&self) -> usize {
        self.graph_sizes.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }
}

/// Batches over a subset of a dataset
#[derive(Debug, Clone)]
pub struct GraphLoader<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
    batch_size: usize,
}

impl<'a> GraphLoader<'a> {
    /// Loader over `indices` of `dataset`
    pub fn new(dataset: &'a Dataset, indices: Vec<usize>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".into()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= dataset.len()) {
            return Err(Error::InsufficientData(format!(
                "index {} out of range for dataset of {} samples",
                bad,
                dataset.len()
            )));
        }
        Ok(Self {
            dataset,
            indices,
            batch_size,
        })
    }

    /// Loader over the whole dataset
    pub fn full(dataset: &'a Dataset, batch_size: usize) -> Result<Self> {
        Self::new(dataset, (0..dataset.len()).collect(), batch_size)
    }

    /// Number of samples the loader visits per pass
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Batches in subset order
    pub fn sequential(&self) -> Batches<'a> {
        self.batches(self.indices.clone())
    }

    /// Batches in a fresh random order (one draw per call)
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'a> {
        let mut order = self.indices.clone();
        order.shuffle(rng);
        self.batches(order)
    }

    fn batches(&self, order: Vec<usize>) -> Batches<'a> {
        Batches {
            dataset: self.dataset,
            order,
            batch_size: self.batch_size,
            cursor: 0,
        }
    }
}

/// Iterator of collated batches
pub struct Batches<'a> {
    dataset: &'a Dataset,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<GraphBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let samples = self.dataset.samples();
        let batch = GraphBatch::collate(self.order[self.cursor..end].iter().map(|&i| &samples[i]));
        self.cursor = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain(n: usize, y: f32) -> GraphSample {
        let x = Array2::from_elem((n, 2), y);
        let edges = (0..n - 1).map(|i| (i, i + 1)).collect();
        GraphSample::new(x, edges, y).unwrap()
    }

    #[test]
    fn test_self_loops_replaced() {
        let edges = IncomingEdges::with_self_loops(3, &[(0, 1), (1, 1), (2, 1), (1, 0)]);
        assert_eq!(edges.num_nodes(), 3);
        assert_eq!(edges.sources_of(0), &[1, 0]);
        assert_eq!(edges.sources_of(1), &[0, 2, 1]);
        assert_eq!(edges.sources_of(2), &[2]);
        assert_eq!(edges.num_edges(), 6);
    }

    #[test]
    fn test_collate_offsets_edges() {
        let a = chain(2, 0.1);
        let b = chain(3, 0.9);
        let batch = GraphBatch::collate([&a, &b]).unwrap();

        assert_eq!(batch.num_graphs(), 2);
        assert_eq!(batch.num_nodes(), 5);
        assert_eq!(batch.graph_index, vec![0, 0, 1, 1, 1]);
        assert_eq!(batch.graph_sizes, vec![2, 3]);
        assert_eq!(batch.targets, array![0.1f32, 0.9]);
        // second graph: 2 -> 3 -> 4
        assert_eq!(batch.edges.sources_of(3), &[2, 3]);
        assert_eq!(batch.edges.sources_of(4), &[3, 4]);
        assert_eq!(batch.edges.sources_of(2), &[2]);
    }

    #[test]
    fn test_collate_empty_is_error() {
        let empty: Vec<&GraphSample> = Vec::new();
        assert!(GraphBatch::collate(empty).is_err());
    }

    #[test]
    fn test_loader_visits_each_index_once() {
        let samples: Vec<GraphSample> = (0..7).map(|i| chain(2, i as f32)).collect();
        let dataset = Dataset::new(samples).unwrap();
        let loader = GraphLoader::new(&dataset, vec![1, 3, 4, 6], 3).unwrap();
        assert_eq!(loader.len(), 4);

        let mut rng = StdRng::seed_from_u64(1);
        let batches: Vec<GraphBatch> = loader.shuffled(&mut rng).map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_graphs(), 3);
        assert_eq!(batches[1].num_graphs(), 1);

        let mut seen: Vec<f32> = batches.iter().flat_map(|b| b.targets.to_vec()).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, vec![1.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_loader_rejects_bad_input() {
        let dataset = Dataset::new(vec![chain(2, 0.0)]).unwrap();
        assert!(GraphLoader::new(&dataset, vec![0], 0).is_err());
        assert!(GraphLoader::new(&dataset, vec![1], 4).is_err());
    }
}
