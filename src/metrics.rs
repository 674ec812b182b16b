use serde::{Deserialize, Serialize};

/// Losses and discriminator accuracy for one epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch index.
    pub epoch: usize,
    pub g_loss: f64,
    pub d_loss: f64,
    /// Fraction in [0, 1] of real+fake images classified correctly.
    pub d_accuracy: f64,
}

/// Append-only training history, one entry per epoch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsHistory {
    entries: Vec<EpochMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.entries.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EpochMetrics] {
        &self.entries
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.entries.last()
    }

    pub fn g_losses(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.g_loss).collect()
    }

    pub fn d_losses(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.d_loss).collect()
    }

    pub fn d_accuracies(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.d_accuracy).collect()
    }
}

/// Running mean over the updates that make up one epoch.
#[derive(Clone, Debug, Default)]
pub(crate) struct EpochAccumulator {
    g_loss: f64,
    d_loss: f64,
    d_accuracy: f64,
    updates: usize,
}

impl EpochAccumulator {
    pub(crate) fn add(&mut self, d_loss: f64, d_accuracy: f64, g_loss: f64) {
        self.d_loss += d_loss;
        self.d_accuracy += d_accuracy;
        self.g_loss += g_loss;
        self.updates += 1;
    }

    pub(crate) fn finish(&self, epoch: usize) -> EpochMetrics {
        let n = self.updates.max(1) as f64;
        EpochMetrics {
            epoch,
            g_loss: self.g_loss / n,
            d_loss: self.d_loss / n,
            d_accuracy: self.d_accuracy / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_averages_updates() {
        let mut acc = EpochAccumulator::default();
        acc.add(1.0, 0.5, 2.0);
        acc.add(3.0, 1.0, 4.0);
        let metrics = acc.finish(7);
        assert_eq!(metrics.epoch, 7);
        assert_eq!(metrics.d_loss, 2.0);
        assert_eq!(metrics.d_accuracy, 0.75);
        assert_eq!(metrics.g_loss, 3.0);
    }

    #[test]
    fn history_columns_stay_aligned() {
        let mut history = MetricsHistory::new();
        for epoch in 1..=3 {
            history.push(EpochMetrics {
                epoch,
                g_loss: epoch as f64,
                d_loss: -(epoch as f64),
                d_accuracy: 0.5,
            });
        }
        assert_eq!(history.g_losses(), vec![1.0, 2.0, 3.0]);
        assert_eq!(history.d_losses(), vec![-1.0, -2.0, -3.0]);
        assert_eq!(history.d_accuracies().len(), 3);

        let json = serde_json::to_string(&history).unwrap();
        let back: MetricsHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
