//! Graph attention model
//!
//! Provides the building blocks of the classifier:
//! - GAT convolution with forward and backward propagation
//! - Global mean pooling and the linear output head
//! - Adam optimizer and checkpoint I/O

mod checkpoint;
mod classifier;
mod gat_conv;
mod linear;
mod optimizer;
mod pooling;

pub use checkpoint::{fold_checkpoint_path, load_checkpoint, restore_checkpoint, save_checkpoint};
pub use classifier::{Architecture, ForwardCache, GatClassifier, ModelGradients};
pub use gat_conv::{GatConv, GatConvCache, GatConvGradients};
pub use linear::{Linear, LinearGradients};
pub use optimizer::{Adam, Optimizer};
pub use pooling::{global_mean_pool, global_mean_pool_backward};
