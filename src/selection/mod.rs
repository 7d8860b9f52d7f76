//! Model selection
//!
//! K-fold splitting and the hidden-width sweep that trains one model per
//! fold and candidate.

mod cross_validation;
mod sweep;

pub use cross_validation::{k_fold, FoldSplit};
pub use sweep::{CandidateResult, FoldResult, SweepDriver, SweepReport};
