//! K-fold cross-validation splits

use crate::error::{Error, Result};

/// Train and test indices of one fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Contiguous, unshuffled K-fold splits
///
/// The first `n_samples % n_folds` folds hold one extra test sample. Each
/// index lands in exactly one test fold; the train set is its complement.
pub fn k_fold(n_samples: usize, n_folds: usize) -> Result<Vec<FoldSplit>> {
    if n_folds < 2 {
        return Err(Error::InsufficientData(format!(
            "k-fold needs at least 2 folds, got {}",
            n_folds
        )));
    }
    if n_samples < n_folds {
        return Err(Error::InsufficientData(format!(
            "cannot split {} samples into {} folds",
            n_samples, n_folds
        )));
    }

    let base = n_samples / n_folds;
    let extra = n_samples % n_folds;

    let mut splits = Vec::with_capacity(n_folds);
    let mut test_start = 0;
    for i in 0..n_folds {
        let fold_size = base + usize::from(i < extra);
        let test_end = test_start + fold_size;

        let test_indices: Vec<usize> = (test_start..test_end).collect();
        let train_indices: Vec<usize> = (0..test_start).chain(test_end..n_samples).collect();

        splits.push(FoldSplit {
            train_indices,
            test_indices,
        });
        test_start = test_end;
    }

    Ok(splits)
}
