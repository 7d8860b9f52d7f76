//! Device selection and inference helpers

use crate::data::GraphLoader;
use crate::error::Result;
use crate::model::GatClassifier;
use crate::training::predictions;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compute device for model evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
}

impl Device {
    /// Best available device; the ndarray backend only runs on the host
    pub fn detect() -> Self {
        Device::Cpu
    }

    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Human-readable description of the detected hardware
pub fn hardware_name() -> String {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    format!(
        "{} ({}, {} threads)",
        Device::detect(),
        std::env::consts::ARCH,
        threads
    )
}

/// Predictions on `device`, aligned with the true labels
pub fn infer(
    model: &GatClassifier,
    loader: &GraphLoader<'_>,
    device: Device,
) -> Result<(Array1<f64>, Array1<f64>)> {
    tracing::info!("Running inference on {}", device);
    predictions(model, loader)
}
