//! Learning-rate warm-up and best-checkpoint bookkeeping

/// Reduced learning rate for the first epochs, then the initial rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    pub initial: f64,
    pub warmup_epochs: usize,
    pub warmup_factor: f64,
}

impl LearningRateSchedule {
    pub fn new(initial: f64, warmup_epochs: usize, warmup_factor: f64) -> Self {
        Self {
            initial,
            warmup_epochs,
            warmup_factor,
        }
    }

    /// Rate for a 1-based epoch
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        if epoch <= self.warmup_epochs {
            self.initial * self.warmup_factor
        } else {
            self.initial
        }
    }
}

/// Lowest validation loss seen so far within a fold
#[derive(Debug, Clone, Copy)]
pub struct BestLossTracker {
    best: f64,
}

impl Default for BestLossTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BestLossTracker {
    pub fn new() -> Self {
        Self {
            best: f64::INFINITY,
        }
    }

    /// Record `loss`; true when it is strictly below every earlier loss
    pub fn observe(&mut self, loss: f64) -> bool {
        if loss < self.best {
            self.best = loss;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}
