//! Running tagging statistics.

use std::ops::AddAssign;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Correct/total tag counts, summed loss and elapsed wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub correct: usize,
    pub total: usize,
    pub loss: f64,
    pub elapsed: Duration,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scored position.
    pub fn observe(&mut self, predicted: u32, gold: u32) {
        if predicted == gold {
            self.correct += 1;
        }
        self.total += 1;
    }

    /// `correct / total`, or `None` when nothing has been counted.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }

    /// Tokens per second over the elapsed interval.
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.total as f64 / secs)
    }

    /// Add every field of `other` into `self`.
    pub fn merge(&mut self, other: &Stats) {
        self.correct += other.correct;
        self.total += other.total;
        self.loss += other.loss;
        self.elapsed += other.elapsed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, rhs: &Stats) {
        self.merge(rhs);
    }
}
