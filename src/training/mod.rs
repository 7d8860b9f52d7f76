//! Training and evaluation loops
//!
//! - `train`: one shuffled pass with parameter updates
//! - `train_epoch`: `train` on a reset optimizer
//! - `test`: average loss without updates
//! - `predictions`: raw outputs with their labels
//! - `LearningRateSchedule` and `BestLossTracker` drive the epoch loop

mod routines;
mod schedule;

pub use routines::{predictions, test, train, train_epoch};
pub use schedule::{BestLossTracker, LearningRateSchedule};
