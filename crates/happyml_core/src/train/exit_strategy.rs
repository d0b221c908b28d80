//! Exit strategies (spec §4.H / §6 `create task with goal`): the policy
//! deciding when a training run stops. `FixedEpochs` bounds the loop
//! directly; the two precision-based strategies watch a loss signal for
//! improvement and stop after `patience` stagnant epochs.

/// An exit strategy's declaration; the mutable improvement-tracking state
/// lives in [`ExitTracker`] so the same strategy value can drive several
/// training runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitStrategy {
    FixedEpochs {
        epochs: usize,
    },
    /// Stop once training loss has dropped under `threshold` and has not
    /// improved for `patience` consecutive epochs.
    HighPrecision {
        threshold: f32,
        patience: usize,
    },
    /// Stop once the test-set loss has not improved by more than
    /// `min_delta` for `patience` consecutive epochs.
    TestPrecision {
        min_delta: f32,
        patience: usize,
    },
}

/// Safety cap on epochs for the precision-based strategies, which have no
/// built-in upper bound (spec leaves `high_precision`/`test_precision`
/// open-ended; a training loop that never converges must still terminate).
pub const DEFAULT_MAX_EPOCHS: usize = 100_000;

impl ExitStrategy {
    pub fn high_precision_default() -> Self {
        ExitStrategy::HighPrecision {
            threshold: 1e-4,
            patience: 5,
        }
    }

    pub fn test_precision_default() -> Self {
        ExitStrategy::TestPrecision {
            min_delta: 1e-3,
            patience: 5,
        }
    }

    pub fn max_epochs(&self) -> usize {
        match self {
            ExitStrategy::FixedEpochs { epochs } => *epochs,
            _ => DEFAULT_MAX_EPOCHS,
        }
    }
}

/// Per-run mutable state for a precision-based [`ExitStrategy`]: the best
/// loss seen so far and how many consecutive epochs have passed without an
/// improvement on it.
pub struct ExitTracker {
    best: f32,
    stagnant_epochs: usize,
}

impl Default for ExitTracker {
    fn default() -> Self {
        Self {
            best: f32::INFINITY,
            stagnant_epochs: 0,
        }
    }
}

impl ExitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per completed epoch. Returns `true` when the strategy
    /// says training should stop.
    pub fn should_stop(&mut self, strategy: &ExitStrategy, epoch: usize, train_loss: f32, test_loss: Option<f32>) -> bool {
        match strategy {
            ExitStrategy::FixedEpochs { epochs } => epoch + 1 >= *epochs,
            ExitStrategy::HighPrecision { threshold, patience } => {
                if train_loss >= *threshold {
                    self.best = self.best.min(train_loss);
                    self.stagnant_epochs = 0;
                    return false;
                }
                if train_loss < self.best {
                    self.best = train_loss;
                    self.stagnant_epochs = 0;
                } else {
                    self.stagnant_epochs += 1;
                }
                self.stagnant_epochs >= *patience
            }
            ExitStrategy::TestPrecision { min_delta, patience } => {
                let loss = test_loss.unwrap_or(train_loss);
                if loss < self.best - *min_delta {
                    self.best = loss;
                    self.stagnant_epochs = 0;
                } else {
                    self.stagnant_epochs += 1;
                }
                self.stagnant_epochs >= *patience
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_epochs_stops_exactly_at_count() {
        let strategy = ExitStrategy::FixedEpochs { epochs: 3 };
        let mut tracker = ExitTracker::new();
        assert!(!tracker.should_stop(&strategy, 0, 1.0, None));
        assert!(!tracker.should_stop(&strategy, 1, 1.0, None));
        assert!(tracker.should_stop(&strategy, 2, 1.0, None));
    }

    #[test]
    fn high_precision_waits_for_threshold_then_patience() {
        let strategy = ExitStrategy::HighPrecision { threshold: 0.1, patience: 2 };
        let mut tracker = ExitTracker::new();
        assert!(!tracker.should_stop(&strategy, 0, 0.5, None));
        assert!(!tracker.should_stop(&strategy, 1, 0.05, None));
        assert!(!tracker.should_stop(&strategy, 2, 0.05, None));
        assert!(tracker.should_stop(&strategy, 3, 0.05, None));
    }

    #[test]
    fn test_precision_tracks_test_loss_not_train_loss() {
        let strategy = ExitStrategy::TestPrecision { min_delta: 0.01, patience: 1 };
        let mut tracker = ExitTracker::new();
        assert!(!tracker.should_stop(&strategy, 0, 10.0, Some(1.0)));
        assert!(tracker.should_stop(&strategy, 1, 10.0, Some(1.0)));
    }
}
