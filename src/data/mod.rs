//! Graph data: samples, dataset loading and batching

mod batch;
mod graph;
mod loader;

pub use batch::{Batches, GraphBatch, GraphLoader, IncomingEdges};
pub use graph::{GraphSample, SampleRecord};
pub use loader::{load_sample, save_sample, Dataset};
