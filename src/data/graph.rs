//! Graph sample representation
//!
//! One protein-homology graph: residue features, directed contacts and a
//! scalar target.

use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk layout of a sample file.
///
/// `edge_index` follows the two-row convention: row 0 holds source nodes,
/// row 1 the matching target nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub x: Vec<Vec<f32>>,
    pub edge_index: Vec<Vec<usize>>,
    pub y: f32,
}

/// A labeled graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSample {
    /// Node feature matrix (num_nodes x in_channels)
    x: Array2<f32>,
    /// Directed edges as (source, target)
    edges: Vec<(usize, usize)>,
    /// Regression / binary target
    y: f32,
}

impl GraphSample {
    /// Create a sample, checking that every edge stays inside the graph
    pub fn new(x: Array2<f32>, edges: Vec<(usize, usize)>, y: f32) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(Error::InvalidGraph("graph has no nodes".into()));
        }
        if let Some(&(src, dst)) = edges.iter().find(|&&(s, d)| s >= n || d >= n) {
            return Err(Error::InvalidGraph(format!(
                "edge ({}, {}) out of range for {} nodes",
                src, dst, n
            )));
        }
        Ok(Self { x, edges, y })
    }

    /// Decode a sample file record
    pub fn from_record(record: SampleRecord, path: &Path) -> Result<Self> {
        let n = record.x.len();
        if n == 0 {
            return Err(Error::invalid_sample(path, "graph has no nodes"));
        }

        let width = record.x[0].len();
        if width == 0 {
            return Err(Error::invalid_sample(path, "node features are empty"));
        }
        if record.x.iter().any(|row| row.len() != width) {
            return Err(Error::invalid_sample(path, "ragged node feature rows"));
        }

        let edges = match record.edge_index.as_slice() {
            [] => Vec::new(),
            [src, dst] => {
                if src.len() != dst.len() {
                    return Err(Error::invalid_sample(
                        path,
                        format!(
                            "edge_index rows differ in length ({} vs {})",
                            src.len(),
                            dst.len()
                        ),
                    ));
                }
                src.iter().copied().zip(dst.iter().copied()).collect()
            }
            rows => {
                return Err(Error::invalid_sample(
                    path,
                    format!("edge_index must have 2 rows, found {}", rows.len()),
                ))
            }
        };

        let flat: Vec<f32> = record.x.into_iter().flatten().collect();
        let x = Array2::from_shape_vec((n, width), flat)?;

        Self::new(x, edges, record.y).map_err(|e| Error::invalid_sample(path, e.to_string()))
    }

    /// Encode back to the on-disk layout
    pub fn to_record(&self) -> SampleRecord {
        let (src, dst): (Vec<usize>, Vec<usize>) = self.edges.iter().copied().unzip();
        SampleRecord {
            x: self.x.rows().into_iter().map(|row| row.to_vec()).collect(),
            edge_index: vec![src, dst],
            y: self.y,
        }
    }

    /// Node feature matrix
    pub fn features(&self) -> &Array2<f32> {
        &self.x
    }

    /// Directed edges
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Target value
    pub fn target(&self) -> f32 {
        self.y
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }
}
