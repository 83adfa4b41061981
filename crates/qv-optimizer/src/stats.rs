//! Per-step fitness statistics and the best-ever record.

use qv_types::{Fitness, FitnessInfo, SearchPoint};
use serde::{Deserialize, Serialize};

/// Median of `values`; the mean of the two middle values for even lengths.
pub fn median(values: &[Fitness]) -> Option<Fitness> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        // halve first so worst-fitness sentinels cannot overflow
        Some(sorted[mid - 1] / 2.0 + sorted[mid] / 2.0)
    }
}

/// Average of the `count` best values (at least one, at most all).
pub fn top_average(values: &[Fitness], count: usize, info: &FitnessInfo) -> Option<Fitness> {
    if values.is_empty() {
        return None;
    }
    let n = count.clamp(1, values.len());
    let sorted = info.sorted_best_first(values);
    let scale = n as f64;
    Some(sorted[..n].iter().map(|v| v / scale).sum())
}

/// Best point and fitness ever observed. Only moves on strict improvement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub point: SearchPoint,
    pub fitness: Fitness,
}

impl BestRecord {
    pub fn new(info: &FitnessInfo, dim: usize) -> Self {
        Self {
            point: SearchPoint::zeros(dim),
            fitness: info.worst_fitness(),
        }
    }

    /// Returns true when the record was replaced.
    pub fn update(&mut self, info: &FitnessInfo, point: &SearchPoint, fitness: Fitness) -> bool {
        if info.is_better(fitness, self.fitness) {
            self.fitness = fitness;
            self.point.set_values(point.values());
            true
        } else {
            false
        }
    }
}

/// Statistics of the most recent step; overwritten every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    pub median: Fitness,
    /// Average of the better half of the step's results.
    pub top_average: Fitness,
    pub best: Fitness,
    pub best_point: SearchPoint,
}

impl StepStats {
    pub fn new(info: &FitnessInfo, dim: usize) -> Self {
        Self {
            median: info.worst_fitness(),
            top_average: info.worst_fitness(),
            best: info.worst_fitness(),
            best_point: SearchPoint::zeros(dim),
        }
    }

    /// Compute the statistics of one evaluated population.
    pub fn compute(
        info: &FitnessInfo,
        population: &[SearchPoint],
        results: &[Fitness],
        best_idx: usize,
    ) -> Self {
        let worst = info.worst_fitness();
        Self {
            median: median(results).unwrap_or(worst),
            top_average: top_average(results, results.len() / 2, info).unwrap_or(worst),
            best: results[best_idx],
            best_point: population[best_idx].clone(),
        }
    }
}
