//! Hidden-width selection for graph attention networks
//!
//! This crate trains a GAT regressor on protein graphs (one node per residue,
//! one scalar homology label per graph) and chooses the hidden width by
//! k-fold cross-validation.
//!
//! # Features
//!
//! - **Data**: JSON graph samples, seeded shuffling, mini-batch collation
//! - **Model**: multi-head GAT convolutions with a hand-written backward pass
//! - **Training**: Adam, learning-rate warm-up, best-checkpoint tracking
//! - **Evaluation**: R², Pearson, thresholded binary metrics, fold summaries
//! - **Selection**: k-fold splits and the sweep over candidate widths
//!
//! # Example
//!
//! ```rust,no_run
//! use gat_homology::{SweepConfig, SweepDriver};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = SweepConfig::default();
//!     config.sweep.hidden_channels = vec![32, 64];
//!
//!     let report = SweepDriver::new(config)?.run()?;
//!     if let Some(best) = report.best_candidate() {
//!         println!("best width: {}", best.hidden_channels);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod selection;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use config::SweepConfig;
pub use data::{Dataset, GraphLoader, GraphSample};
pub use error::{Error, Result};
pub use evaluation::{FoldMetrics, R2Summary};
pub use model::{Architecture, GatClassifier};
pub use selection::{k_fold, SweepDriver, SweepReport};
pub use utils::{infer, Device};
