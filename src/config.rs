//! Configuration handling.
//!
//! Defaults reproduce the constants of the hidden-width sweep; a TOML file
//! may override any of them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    /// Dataset location
    pub data: DataConfig,
    /// Fixed model hyperparameters
    pub model: ModelConfig,
    /// Optimization settings
    pub training: TrainingConfig,
    /// Candidate widths and output locations
    pub sweep: SweepSettings,
}

impl SweepConfig {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SweepConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the sweep cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.model.in_channels == 0 {
            return invalid("model.in_channels must be > 0");
        }
        if self.model.num_heads == 0 {
            return invalid("model.num_heads must be > 0");
        }
        if self.model.num_layers == 0 {
            return invalid("model.num_layers must be > 0");
        }
        if self.training.batch_size == 0 {
            return invalid("training.batch_size must be > 0");
        }
        if self.training.epochs == 0 {
            return invalid("training.epochs must be > 0");
        }
        if self.training.folds < 2 {
            return invalid("training.folds must be >= 2");
        }
        if !(self.training.initial_lr > 0.0 && self.training.initial_lr.is_finite()) {
            return invalid("training.initial_lr must be a positive number");
        }
        if !(self.training.warmup_factor > 0.0 && self.training.warmup_factor.is_finite()) {
            return invalid("training.warmup_factor must be a positive number");
        }
        if self.sweep.hidden_channels.is_empty() {
            return invalid("sweep.hidden_channels must list at least one width");
        }
        if self.sweep.hidden_channels.contains(&0) {
            return invalid("sweep.hidden_channels must not contain 0");
        }
        if !self.sweep.threshold.is_finite() {
            return invalid("sweep.threshold must be finite");
        }
        Ok(())
    }
}

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding one JSON file per graph sample
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/homology/train"),
        }
    }
}

/// Model hyperparameters held fixed during the sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Node feature width (BLOSUM62 + ESM embedding)
    pub in_channels: usize,
    /// Attention heads per layer
    pub num_heads: usize,
    /// Number of GAT layers
    pub num_layers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            in_channels: 1300,
            num_heads: 8,
            num_layers: 2,
        }
    }
}

/// Optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Graphs per batch
    pub batch_size: usize,
    /// Epochs per fold
    pub epochs: usize,
    /// Adam learning rate after warm-up
    pub initial_lr: f64,
    /// Epochs (counted from 1) trained at the reduced rate
    pub warmup_epochs: usize,
    /// Multiplier applied to the rate during warm-up
    pub warmup_factor: f64,
    /// Number of cross-validation folds
    pub folds: usize,
    /// Seed for shuffling, initialization and batching
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            epochs: 20,
            initial_lr: 0.000005,
            warmup_epochs: 9,
            warmup_factor: 0.5,
            folds: 5,
            seed: 2023,
        }
    }
}

/// Sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepSettings {
    /// Candidate hidden-channel widths
    pub hidden_channels: Vec<usize>,
    /// Directory for per-fold checkpoints
    pub checkpoint_dir: PathBuf,
    /// Optional JSON report written after the sweep
    pub report_path: Option<PathBuf>,
    /// Cut-off turning regression outputs into binary labels
    pub threshold: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            hidden_channels: vec![32, 64, 128, 256, 512, 1024, 2048],
            checkpoint_dir: PathBuf::from("checkpoints/num_hidden_channels"),
            report_path: None,
            threshold: 0.5,
        }
    }
}
