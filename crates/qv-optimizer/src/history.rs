//! Bounded fitness history and the least-squares trend fitted over it.

use std::collections::VecDeque;

use qv_types::{Fitness, UsageError};
use serde::{Deserialize, Serialize};

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFunction {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFunction {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Least-squares fit of `ys` sampled at `x0, x0 + 1, x0 + 2, ...`.
    pub fn fit(x0: f64, ys: impl ExactSizeIterator<Item = f64> + Clone) -> Self {
        let n = ys.len();
        if n == 0 {
            return Self {
                slope: 0.0,
                intercept: 0.0,
            };
        }
        let nf = n as f64;
        let mean_x = x0 + (nf - 1.0) / 2.0;
        let mean_y = ys.clone().map(|y| y / nf).sum::<f64>();

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in ys.enumerate() {
            let dx = x0 + i as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Self {
            slope,
            intercept: mean_y - slope * mean_x,
        }
    }
}

/// Ring buffer of per-step average fitness samples.
///
/// `total_samples` counts every sample ever recorded, so after eviction the
/// buffer's first element sits at x = `total_samples - len`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessHistory {
    samples: VecDeque<Fitness>,
    capacity: usize,
    total_samples: usize,
}

impl FitnessHistory {
    /// A capacity of zero disables tracking.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_samples: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn samples(&self) -> impl ExactSizeIterator<Item = Fitness> + Clone + '_ {
        self.samples.iter().copied()
    }

    /// Record a sample, evicting the oldest one when full. No-op when disabled.
    pub fn push(&mut self, value: Fitness) {
        if !self.is_enabled() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.total_samples += 1;
    }

    /// Line fitted through the buffered samples on the global step axis.
    pub fn trend(&self) -> LinearFunction {
        let start = (self.total_samples - self.samples.len()) as f64;
        LinearFunction::fit(start, self.samples())
    }

    /// Relative slope of the trend at the buffer midpoint, positive when
    /// improving in either direction.
    pub fn progress(&self, minimize: bool) -> Result<f64, UsageError> {
        if !self.is_enabled() {
            return Err(UsageError::HistoryDisabled);
        }
        if self.samples.len() < 2 {
            return Ok(0.0);
        }
        let trend = self.trend();
        let midpoint = self.total_samples as f64 - 0.5 * self.samples.len() as f64;
        let relative = trend.slope / trend.eval(midpoint);
        Ok(if minimize { -relative } else { relative })
    }

    /// Trend extrapolated to `step`.
    pub fn predicted_fitness(&self, step: usize) -> Result<f64, UsageError> {
        if !self.is_enabled() {
            return Err(UsageError::HistoryDisabled);
        }
        if self.samples.len() < 2 {
            return Ok(0.0);
        }
        Ok(self.trend().eval(step as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, values: &[f64]) -> FitnessHistory {
        let mut history = FitnessHistory::new(capacity);
        for &v in values {
            history.push(v);
        }
        history
    }

    #[test]
    fn never_exceeds_capacity() {
        let history = filled(3, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.samples().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert_eq!(history.total_samples(), 5);
    }

    #[test]
    fn disabled_history_ignores_samples() {
        let mut history = FitnessHistory::new(0);
        history.push(1.0);
        assert!(history.is_empty());
        assert_eq!(history.total_samples(), 0);
        assert_eq!(history.progress(true), Err(UsageError::HistoryDisabled));
        assert_eq!(history.predicted_fitness(3), Err(UsageError::HistoryDisabled));
    }

    #[test]
    fn fewer_than_two_samples_yield_zero() {
        let history = filled(5, &[4.0]);
        assert_eq!(history.progress(true), Ok(0.0));
        assert_eq!(history.predicted_fitness(10), Ok(0.0));
    }

    #[test]
    fn trend_uses_global_axis_after_eviction() {
        // y = 2x + 1 sampled at x = 0..6, only the last 4 kept
        let values: Vec<f64> = (0..6).map(|x| 2.0 * x as f64 + 1.0).collect();
        let history = filled(4, &values);
        let trend = history.trend();
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 1.0).abs() < 1e-9);
        assert!((history.predicted_fitness(10).unwrap() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn progress_is_positive_when_improving() {
        // minimizing: averages go down
        let minimizing = filled(10, &[10.0, 9.0, 8.0, 7.0, 6.0]);
        assert!(minimizing.progress(true).unwrap() > 0.0);

        // maximizing: averages go up
        let maximizing = filled(10, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(maximizing.progress(false).unwrap() > 0.0);

        // worsening in either direction is negative
        assert!(maximizing.progress(true).unwrap() < 0.0);
        assert!(minimizing.progress(false).unwrap() < 0.0);
    }

    #[test]
    fn progress_is_scale_free() {
        let small = filled(10, &[10.0, 9.0, 8.0, 7.0]);
        let large = filled(10, &[1000.0, 900.0, 800.0, 700.0]);
        let a = small.progress(true).unwrap();
        let b = large.progress(true).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn flat_history_has_no_progress() {
        let history = filled(5, &[3.0, 3.0, 3.0]);
        assert_eq!(history.progress(true), Ok(0.0));
    }
}
