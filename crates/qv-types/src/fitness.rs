//! Fitness ordering: whether an objective is minimized or maximized, and
//! what the worst possible value is.

use serde::{Deserialize, Serialize};

/// A single objective value.
pub type Fitness = f64;

/// Fitness values, index-aligned with the population they were computed for.
pub type FitnessVec = Vec<Fitness>;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Minimize
    }
}

/// Ordering semantics for fitness values of one objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessInfo {
    direction: ObjectiveDirection,
    worst_fitness: Fitness,
}

impl FitnessInfo {
    pub fn new(direction: ObjectiveDirection) -> Self {
        let worst_fitness = match direction {
            ObjectiveDirection::Minimize => f64::MAX,
            ObjectiveDirection::Maximize => f64::MIN,
        };
        Self {
            direction,
            worst_fitness,
        }
    }

    pub fn minimize() -> Self {
        Self::new(ObjectiveDirection::Minimize)
    }

    pub fn maximize() -> Self {
        Self::new(ObjectiveDirection::Maximize)
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    pub fn is_minimizing(&self) -> bool {
        self.direction == ObjectiveDirection::Minimize
    }

    /// Sentinel every real result improves on; also the value assigned to
    /// candidates whose evaluation failed.
    pub fn worst_fitness(&self) -> Fitness {
        self.worst_fitness
    }

    /// True when `a` is strictly better than `b`. NaN is never better.
    pub fn is_better(&self, a: Fitness, b: Fitness) -> bool {
        match self.direction {
            ObjectiveDirection::Minimize => a < b,
            ObjectiveDirection::Maximize => a > b,
        }
    }

    /// Index of the best value; ties go to the lowest index.
    pub fn find_best_fitness(&self, values: &[Fitness]) -> Option<usize> {
        if values.is_empty() {
            return None;
        }
        let mut best = 0;
        for (idx, &value) in values.iter().enumerate().skip(1) {
            if self.is_better(value, values[best]) {
                best = idx;
            }
        }
        Some(best)
    }

    /// Values sorted best first.
    pub fn sorted_best_first(&self, values: &[Fitness]) -> FitnessVec {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| {
            let ord = a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
            match self.direction {
                ObjectiveDirection::Minimize => ord,
                ObjectiveDirection::Maximize => ord.reverse(),
            }
        });
        sorted
    }
}

impl Default for FitnessInfo {
    fn default() -> Self {
        Self::minimize()
    }
}
