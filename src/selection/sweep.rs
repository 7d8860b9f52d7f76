//! Hidden-width sweep with k-fold cross-validation

use super::cross_validation::{k_fold, FoldSplit};
use crate::config::SweepConfig;
use crate::data::{Dataset, GraphLoader};
use crate::error::{Error, Result};
use crate::evaluation::{FoldMetrics, R2Summary};
use crate::model::{
    fold_checkpoint_path, restore_checkpoint, save_checkpoint, Adam, Architecture, GatClassifier,
};
use crate::training::{predictions, test, train_epoch, BestLossTracker, LearningRateSchedule};
use chrono::{DateTime, Local, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Outcome of one fold for one candidate width
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldResult {
    /// 1-based fold index
    pub fold: usize,
    /// Lowest validation loss reached during training
    pub best_validation_loss: Option<f64>,
    pub checkpoint: PathBuf,
    pub metrics: FoldMetrics,
    pub finished_at: DateTime<Utc>,
}

/// All folds of one candidate width
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub hidden_channels: usize,
    pub folds: Vec<FoldResult>,
    pub summary: Option<R2Summary>,
}

impl CandidateResult {
    pub fn mean_r2(&self) -> Option<f64> {
        self.summary.as_ref().map(|s| s.mean)
    }
}

/// Results of a whole sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub num_samples: usize,
    pub candidates: Vec<CandidateResult>,
}

impl SweepReport {
    /// Candidate with the highest mean R², ignoring NaN summaries
    pub fn best_candidate(&self) -> Option<&CandidateResult> {
        self.candidates
            .iter()
            .filter_map(|c| c.mean_r2().filter(|m| !m.is_nan()).map(|m| (c, m)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }

    /// Write the report as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Fold checkpoint rewritten only when validation loss strictly improves
struct BestCheckpoint {
    path: PathBuf,
    tracker: BestLossTracker,
    saved: bool,
}

impl BestCheckpoint {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            tracker: BestLossTracker::new(),
            saved: false,
        }
    }

    /// Save `model` if `loss` beats every earlier loss; true when written
    fn observe(&mut self, model: &GatClassifier, loss: f64) -> Result<bool> {
        if !self.tracker.observe(loss) {
            return Ok(false);
        }
        save_checkpoint(model, &self.path)?;
        self.saved = true;
        Ok(true)
    }

    /// Load the best weights into `model`; false when nothing was saved
    fn restore(&self, model: &mut GatClassifier) -> Result<bool> {
        if !self.saved {
            return Ok(false);
        }
        restore_checkpoint(model, &self.path)?;
        Ok(true)
    }

    fn best_loss(&self) -> Option<f64> {
        self.tracker.best()
    }
}

/// Runs the cross-validated sweep over candidate hidden widths
pub struct SweepDriver {
    config: SweepConfig,
}

impl SweepDriver {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Load the configured data directory and sweep over it
    pub fn run(&self) -> Result<SweepReport> {
        let dataset = Dataset::load_dir(&self.config.data.data_dir)?;
        self.run_on(dataset)
    }

    /// Sweep over an already loaded dataset
    pub fn run_on(&self, mut dataset: Dataset) -> Result<SweepReport> {
        let started_at = Utc::now();
        let training = &self.config.training;
        let mut rng = StdRng::seed_from_u64(training.seed);

        match dataset.num_features() {
            Some(width) if width == self.config.model.in_channels => {}
            Some(width) => {
                return Err(Error::ArchitectureMismatch(format!(
                    "samples have {} node features, model expects {}",
                    width, self.config.model.in_channels
                )))
            }
            None => return Err(Error::InsufficientData("dataset is empty".into())),
        }

        dataset.shuffle(&mut rng);
        let splits = k_fold(dataset.len(), training.folds)?;
        std::fs::create_dir_all(&self.config.sweep.checkpoint_dir)?;

        tracing::info!(
            samples = dataset.len(),
            folds = training.folds,
            candidates = ?self.config.sweep.hidden_channels,
            "Starting hidden-width sweep"
        );

        let mut candidates = Vec::with_capacity(self.config.sweep.hidden_channels.len());
        for &hidden_channels in &self.config.sweep.hidden_channels {
            let candidate = self.run_candidate(&dataset, &splits, hidden_channels, &mut rng)?;
            candidates.push(candidate);
        }

        let report = SweepReport {
            started_at,
            finished_at: Utc::now(),
            num_samples: dataset.len(),
            candidates,
        };

        if let Some(best) = report.best_candidate() {
            tracing::info!(
                hidden_channels = best.hidden_channels,
                mean_r2 = best.mean_r2(),
                "Best candidate"
            );
        }
        if let Some(path) = &self.config.sweep.report_path {
            report.save(path)?;
            tracing::info!("Sweep report written to {}", path.display());
        }

        Ok(report)
    }

    fn run_candidate(
        &self,
        dataset: &Dataset,
        splits: &[FoldSplit],
        hidden_channels: usize,
        rng: &mut StdRng,
    ) -> Result<CandidateResult> {
        let architecture = Architecture {
            in_channels: self.config.model.in_channels,
            hidden_channels,
            num_heads: self.config.model.num_heads,
            num_layers: self.config.model.num_layers,
        };
        tracing::info!(hidden_channels, "Evaluating candidate");

        let mut folds = Vec::with_capacity(splits.len());
        for (i, split) in splits.iter().enumerate() {
            folds.push(self.run_fold(dataset, split, i + 1, architecture, rng)?);
        }

        let summary = R2Summary::from_scores(folds.iter().map(|f| f.metrics.r2).collect());
        if let Some(summary) = &summary {
            println!(
                "For num_hidden_channels = {}, Mean R² = {}",
                hidden_channels,
                summary.summary()
            );
        }

        Ok(CandidateResult {
            hidden_channels,
            folds,
            summary,
        })
    }

    fn run_fold(
        &self,
        dataset: &Dataset,
        split: &FoldSplit,
        fold: usize,
        architecture: Architecture,
        rng: &mut StdRng,
    ) -> Result<FoldResult> {
        let training = &self.config.training;
        let train_loader = GraphLoader::new(dataset, split.train_indices.clone(), training.batch_size)?;
        let test_loader = GraphLoader::new(dataset, split.test_indices.clone(), training.batch_size)?;

        let mut model = GatClassifier::new(architecture, rng)?;
        let mut optimizer = Adam::new(training.initial_lr);
        let schedule = LearningRateSchedule::new(
            training.initial_lr,
            training.warmup_epochs,
            training.warmup_factor,
        );
        let checkpoint = fold_checkpoint_path(&self.config.sweep.checkpoint_dir, fold);
        let mut best = BestCheckpoint::new(checkpoint.clone());

        for epoch in 1..=training.epochs {
            let learning_rate = schedule.learning_rate(epoch);
            train_epoch(&mut model, &train_loader, &mut optimizer, learning_rate, rng)?;

            let train_loss = test(&model, &train_loader)?;
            let test_loss = test(&model, &test_loader)?;
            tracing::debug!(
                "Fold: {}, Epoch: {:03}, LR: {:.2e}, Train Loss: {:.4}, Test Loss: {:.4}",
                fold,
                epoch,
                learning_rate,
                train_loss,
                test_loss
            );

            best.observe(&model, test_loss)?;
        }

        if !best.restore(&mut model)? {
            tracing::warn!(fold, "Validation loss never improved; evaluating final weights");
        }

        let test_loss = test(&model, &test_loader)?;
        let (y_hat, y_true) = predictions(&model, &test_loader)?;
        let metrics = FoldMetrics::compute(&y_true, &y_hat, test_loss, self.config.sweep.threshold);
        println!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), metrics);

        drop(model);

        Ok(FoldResult {
            fold,
            best_validation_loss: best.best_loss(),
            checkpoint,
            metrics,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GraphSample;
    use crate::model::load_checkpoint;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn synthetic(n: usize, width: usize) -> Dataset {
        let samples = (0..n)
            .map(|i| {
                let y = if i % 2 == 0 { 0.9 } else { 0.1 };
                let x = Array2::from_shape_fn((4, width), |(r, c)| y * ((r + c) % 3) as f32);
                GraphSample::new(x, vec![(0, 1), (1, 2), (2, 3), (3, 0)], y).unwrap()
            })
            .collect();
        Dataset::new(samples).unwrap()
    }

    fn config(dir: &Path) -> SweepConfig {
        let mut config = SweepConfig::default();
        config.model.in_channels = 3;
        config.model.num_heads = 2;
        config.training.epochs = 3;
        config.training.warmup_epochs = 1;
        config.training.folds = 3;
        config.training.batch_size = 4;
        config.training.initial_lr = 0.01;
        config.sweep.hidden_channels = vec![2, 4];
        config.sweep.checkpoint_dir = dir.join("ckpt");
        config
    }

    #[test]
    fn test_sweep_records_every_fold() {
        let dir = tempdir().unwrap();
        let driver = SweepDriver::new(config(dir.path())).unwrap();
        let report = driver.run_on(synthetic(9, 3)).unwrap();

        assert_eq!(report.num_samples, 9);
        assert_eq!(report.candidates.len(), 2);
        for candidate in &report.candidates {
            assert_eq!(candidate.folds.len(), 3);
            let summary = candidate.summary.as_ref().unwrap();
            assert_eq!(summary.scores.len(), 3);
        }
        for fold in 1..=3 {
            assert!(fold_checkpoint_path(&dir.path().join("ckpt"), fold).exists());
        }
    }

    #[test]
    fn test_feature_width_mismatch() {
        let dir = tempdir().unwrap();
        let driver = SweepDriver::new(config(dir.path())).unwrap();
        assert!(matches!(
            driver.run_on(synthetic(9, 5)),
            Err(Error::ArchitectureMismatch(_))
        ));
    }

    #[test]
    fn test_too_few_samples() {
        let dir = tempdir().unwrap();
        let driver = SweepDriver::new(config(dir.path())).unwrap();
        assert!(matches!(
            driver.run_on(synthetic(2, 3)),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_checkpoint_written_only_on_improvement() {
        let dir = tempdir().unwrap();
        let path = fold_checkpoint_path(dir.path(), 1);
        let mut rng = StdRng::seed_from_u64(8);
        let arch = Architecture {
            in_channels: 3,
            hidden_channels: 2,
            num_heads: 2,
            num_layers: 2,
        };
        let first = GatClassifier::new(arch, &mut rng).unwrap();
        let worse = GatClassifier::new(arch, &mut rng).unwrap();
        let tied = GatClassifier::new(arch, &mut rng).unwrap();
        let better = GatClassifier::new(arch, &mut rng).unwrap();

        let mut best = BestCheckpoint::new(path.clone());
        let mut model = GatClassifier::new(arch, &mut rng).unwrap();
        assert!(!best.restore(&mut model).unwrap());
        assert!(!path.exists());

        assert!(best.observe(&first, 0.5).unwrap());
        assert!(!best.observe(&worse, 0.7).unwrap());
        assert!(!best.observe(&tied, 0.5).unwrap());
        assert_eq!(load_checkpoint(&path).unwrap(), first);

        assert!(best.observe(&better, 0.3).unwrap());
        assert!(best.restore(&mut model).unwrap());
        assert_eq!(model, better);
        assert_eq!(best.best_loss(), Some(0.3));
    }

    #[test]
    fn test_fold_restores_lowest_validation_loss() {
        let dir = tempdir().unwrap();
        let driver = SweepDriver::new(config(dir.path())).unwrap();
        let dataset = synthetic(9, 3);
        let split = &k_fold(dataset.len(), 3).unwrap()[0];
        let arch = Architecture {
            in_channels: 3,
            hidden_channels: 2,
            num_heads: 2,
            num_layers: 2,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let result = driver.run_fold(&dataset, split, 1, arch, &mut rng).unwrap();

        let saved = load_checkpoint(&result.checkpoint).unwrap();
        let loader = GraphLoader::new(&dataset, split.test_indices.clone(), 4).unwrap();
        let saved_loss = test(&saved, &loader).unwrap();
        let best = result.best_validation_loss.unwrap();
        assert!((saved_loss - best).abs() < 1e-9);
        assert!((result.metrics.test_loss - best).abs() < 1e-9);
    }

    #[test]
    fn test_best_candidate_skips_nan() {
        let candidate = |width: usize, scores: Vec<f64>| CandidateResult {
            hidden_channels: width,
            folds: Vec::new(),
            summary: R2Summary::from_scores(scores),
        };
        let report = SweepReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            num_samples: 0,
            candidates: vec![
                candidate(8, vec![0.2, 0.4]),
                candidate(16, vec![f64::NAN, 0.9]),
                candidate(32, vec![0.5, 0.6]),
            ],
        };
        assert_eq!(report.best_candidate().unwrap().hidden_channels, 32);
    }
}
