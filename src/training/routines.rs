//! One-pass training, evaluation and prediction routines
//!
//! Loss is the summed squared error over a batch; the returned averages are
//! per sample of the loader.

use crate::data::GraphLoader;
use crate::error::{Error, Result};
use crate::model::{GatClassifier, Optimizer};
use ndarray::Array1;
use rand::Rng;

fn ensure_not_empty(loader: &GraphLoader<'_>) -> Result<()> {
    if loader.is_empty() {
        return Err(Error::InsufficientData("loader has no samples".into()));
    }
    Ok(())
}

fn squared_error(output: &Array1<f32>, targets: &Array1<f32>) -> f64 {
    output
        .iter()
        .zip(targets.iter())
        .map(|(&o, &t)| {
            let d = (o - t) as f64;
            d * d
        })
        .sum()
}

/// One optimization pass in shuffled order; returns average loss per sample
pub fn train<R: Rng + ?Sized>(
    model: &mut GatClassifier,
    loader: &GraphLoader<'_>,
    optimizer: &mut dyn Optimizer,
    rng: &mut R,
) -> Result<f64> {
    ensure_not_empty(loader)?;

    let mut total_loss = 0.0;
    for batch in loader.shuffled(rng) {
        let batch = batch?;
        let (output, cache) = model.forward_train(&batch)?;
        total_loss += squared_error(&output, &batch.targets);

        // d/dy sum (y - t)^2
        let gradient = (&output - &batch.targets) * 2.0;
        let gradients = model.backward(&batch, &cache, &gradient);
        model.apply_gradients(&gradients, optimizer);
    }

    Ok(total_loss / loader.len() as f64)
}

/// One epoch on a freshly reset optimizer at `learning_rate`
///
/// Moment estimates and step counts start over every epoch.
pub fn train_epoch<R: Rng + ?Sized>(
    model: &mut GatClassifier,
    loader: &GraphLoader<'_>,
    optimizer: &mut dyn Optimizer,
    learning_rate: f64,
    rng: &mut R,
) -> Result<f64> {
    optimizer.reset();
    optimizer.set_learning_rate(learning_rate);
    train(model, loader, optimizer, rng)
}

/// One evaluation pass without updates; returns average loss per sample
pub fn test(model: &GatClassifier, loader: &GraphLoader<'_>) -> Result<f64> {
    ensure_not_empty(loader)?;

    let mut total_loss = 0.0;
    for batch in loader.sequential() {
        let batch = batch?;
        let output = model.forward(&batch)?;
        total_loss += squared_error(&output, &batch.targets);
    }

    Ok(total_loss / loader.len() as f64)
}

/// Raw outputs and true labels, aligned
pub fn predictions(
    model: &GatClassifier,
    loader: &GraphLoader<'_>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let mut y_hat = Vec::with_capacity(loader.len());
    let mut y_true = Vec::with_capacity(loader.len());

    for batch in loader.sequential() {
        let batch = batch?;
        let output = model.forward(&batch)?;
        y_hat.extend(output.iter().map(|&v| v as f64));
        y_true.extend(batch.targets.iter().map(|&v| v as f64));
    }

    Ok((Array1::from_vec(y_hat), Array1::from_vec(y_true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, GraphSample};
    use crate::model::{Adam, Architecture};
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset() -> Dataset {
        let samples = (0..6)
            .map(|i| {
                let y = if i % 2 == 0 { 0.8 } else { 0.2 };
                let x = Array2::from_shape_fn((3, 4), |(r, c)| y * (r + c) as f32 / 4.0);
                GraphSample::new(x, vec![(0, 1), (1, 2), (2, 0)], y).unwrap()
            })
            .collect();
        Dataset::new(samples).unwrap()
    }

    fn model(rng: &mut StdRng) -> GatClassifier {
        let arch = Architecture {
            in_channels: 4,
            hidden_channels: 3,
            num_heads: 2,
            num_layers: 2,
        };
        GatClassifier::new(arch, rng).unwrap()
    }

    #[test]
    fn test_loss_is_average_per_sample() {
        let data = dataset();
        let mut rng = StdRng::seed_from_u64(9);
        let model = model(&mut rng);
        let loader = GraphLoader::full(&data, 4).unwrap();

        let (y_hat, y_true) = predictions(&model, &loader).unwrap();
        assert_eq!(y_hat.len(), 6);
        assert_eq!(y_true.len(), 6);

        let expected = (&y_hat - &y_true).mapv(|d| d * d).sum() / 6.0;
        let loss = test(&model, &loader).unwrap();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_training_reduces_loss() {
        let data = dataset();
        let mut rng = StdRng::seed_from_u64(4);
        let mut model = model(&mut rng);
        let loader = GraphLoader::full(&data, 2).unwrap();
        let mut optimizer = Adam::new(0.01);

        let before = test(&model, &loader).unwrap();
        for _ in 0..30 {
            train(&mut model, &loader, &mut optimizer, &mut rng).unwrap();
        }
        assert!(test(&model, &loader).unwrap() < before);
    }

    #[test]
    fn test_epochs_do_not_share_optimizer_state() {
        let data = dataset();
        let loader = GraphLoader::full(&data, 2).unwrap();
        let mut init_rng = StdRng::seed_from_u64(5);
        let start = model(&mut init_rng);

        // One optimizer reused across epochs
        let mut reused = start.clone();
        let mut optimizer = Adam::new(0.01);
        let mut rng = StdRng::seed_from_u64(6);
        for lr in [0.005, 0.01] {
            train_epoch(&mut reused, &loader, &mut optimizer, lr, &mut rng).unwrap();
        }

        // A brand new optimizer each epoch
        let mut fresh = start.clone();
        let mut rng = StdRng::seed_from_u64(6);
        for lr in [0.005, 0.01] {
            let mut optimizer = Adam::new(lr);
            train(&mut fresh, &loader, &mut optimizer, &mut rng).unwrap();
        }

        // Moments carried into the second epoch
        let mut carried = start.clone();
        let mut optimizer = Adam::new(0.005);
        let mut rng = StdRng::seed_from_u64(6);
        train(&mut carried, &loader, &mut optimizer, &mut rng).unwrap();
        optimizer.set_learning_rate(0.01);
        train(&mut carried, &loader, &mut optimizer, &mut rng).unwrap();

        assert_eq!(reused, fresh);
        assert_ne!(reused, carried);
    }

    #[test]
    fn test_empty_loader() {
        let data = dataset();
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = model(&mut rng);
        let loader = GraphLoader::new(&data, Vec::new(), 2).unwrap();
        let mut optimizer = Adam::new(0.01);
        assert!(test(&model, &loader).is_err());
        assert!(train(&mut model, &loader, &mut optimizer, &mut rng).is_err());
    }
}
