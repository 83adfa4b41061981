//! Stop conditions tested before every step.

use qv_types::{Fitness, SearchPoint};
use serde::{Deserialize, Serialize};

use crate::state::OptimizerState;

/// Predicate over optimizer state; the run ends when one returns true.
pub trait StopCondition: Send {
    /// Why the run stopped, for logs and callers.
    fn what(&self) -> String;

    fn test(&mut self, state: &OptimizerState) -> bool;

    /// Conditions that read the fitness trend need history tracking.
    fn requires_history(&self) -> bool {
        false
    }
}

/// The stop condition that matched, by registration index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReason {
    pub index: usize,
    pub what: String,
}

/// Matches once the optimizer's interrupt flag is raised. Always registered.
#[derive(Debug, Clone, Default)]
pub struct AbortCondition;

impl StopCondition for AbortCondition {
    fn what(&self) -> String {
        "Aborted by user".to_string()
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        state.interrupt_requested()
    }
}

#[derive(Debug, Clone)]
pub struct MaxStepsCondition {
    pub max_steps: usize,
}

impl MaxStepsCondition {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }
}

impl StopCondition for MaxStepsCondition {
    fn what(&self) -> String {
        "Maximum number of steps reached".to_string()
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        state.step_count() >= self.max_steps
    }
}

/// Matches when the step's best and median results are within `epsilon`.
#[derive(Debug, Clone)]
pub struct FlatFitnessCondition {
    pub epsilon: Fitness,
}

impl FlatFitnessCondition {
    pub fn new(epsilon: Fitness) -> Self {
        Self { epsilon }
    }
}

impl StopCondition for FlatFitnessCondition {
    fn what(&self) -> String {
        "Flat fitness".to_string()
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        state.step_count() > 0
            && (state.current_step_best() - state.current_step_median()).abs() <= self.epsilon
    }
}

/// Matches when the fitness trend has flattened below `min_progress`.
#[derive(Debug, Clone)]
pub struct MinProgressCondition {
    pub min_progress: f64,
    pub min_samples: usize,
}

impl MinProgressCondition {
    pub fn new(min_progress: f64) -> Self {
        Self {
            min_progress,
            min_samples: 200,
        }
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }
}

impl StopCondition for MinProgressCondition {
    fn what(&self) -> String {
        "Minimum progress reached".to_string()
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        if state.history().total_samples() < self.min_samples {
            return false;
        }
        matches!(state.progress(), Ok(p) if p < self.min_progress)
    }

    fn requires_history(&self) -> bool {
        true
    }
}

/// Matches when the extrapolated trend, `look_ahead` steps from now, is not
/// better than the target `fitness`.
#[derive(Debug, Clone)]
pub struct PredictedFitnessCondition {
    pub fitness: Fitness,
    pub look_ahead: usize,
    pub min_samples: usize,
    prediction: Option<Fitness>,
}

impl PredictedFitnessCondition {
    pub fn new(fitness: Fitness, look_ahead: usize) -> Self {
        Self {
            fitness,
            look_ahead,
            min_samples: 100,
            prediction: None,
        }
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Prediction computed by the last test, if any.
    pub fn prediction(&self) -> Option<Fitness> {
        self.prediction
    }
}

impl StopCondition for PredictedFitnessCondition {
    fn what(&self) -> String {
        match self.prediction {
            Some(p) => format!(
                "Predicted fitness {p:.6} after {} steps does not exceed target {}",
                self.look_ahead, self.fitness
            ),
            None => "Predicted fitness".to_string(),
        }
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        if state.history().total_samples() < self.min_samples {
            return false;
        }
        let Ok(prediction) = state.predicted_fitness(state.step_count() + self.look_ahead) else {
            return false;
        };
        self.prediction = Some(prediction);
        !state.info().is_better(prediction, self.fitness)
    }

    fn requires_history(&self) -> bool {
        true
    }
}

/// Matches when the best point comes within `min_distance` of a known point.
#[derive(Debug, Clone)]
pub struct SimilarityCondition {
    pub points: Vec<SearchPoint>,
    pub min_distance: f64,
    pub min_steps: usize,
    similar_idx: Option<usize>,
}

impl SimilarityCondition {
    pub fn new(points: Vec<SearchPoint>, min_distance: f64) -> Self {
        Self {
            points,
            min_distance,
            min_steps: 10,
            similar_idx: None,
        }
    }

    pub fn with_min_steps(mut self, min_steps: usize) -> Self {
        self.min_steps = min_steps;
        self
    }

    /// Index of the reference point that matched.
    pub fn similar_index(&self) -> Option<usize> {
        self.similar_idx
    }
}

impl StopCondition for SimilarityCondition {
    fn what(&self) -> String {
        match self.similar_idx {
            Some(idx) => format!("Similar search point ({idx})"),
            None => "Similar search point".to_string(),
        }
    }

    fn test(&mut self, state: &OptimizerState) -> bool {
        if state.step_count() < self.min_steps {
            return false;
        }
        let best = state.best_point();
        self.similar_idx = self
            .points
            .iter()
            .position(|p| best.distance_to(p.values()) < self.min_distance);
        self.similar_idx.is_some()
    }
}
