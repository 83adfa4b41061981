//! Read-only view of the optimizer handed to stop conditions, reporters and
//! search strategies.

use qv_types::{Fitness, FitnessInfo, InterruptFlag, SearchPoint, UsageError};
use uuid::Uuid;

use crate::history::{FitnessHistory, LinearFunction};
use crate::stats::{BestRecord, StepStats};

/// Lifecycle of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerStatus {
    NotStarted,
    Running,
    Stopped,
}

/// Everything the control loop tracks between steps.
#[derive(Debug)]
pub struct OptimizerState {
    pub(crate) id: Uuid,
    pub(crate) info: FitnessInfo,
    pub(crate) dim: usize,
    pub(crate) step_count: usize,
    pub(crate) status: OptimizerStatus,
    pub(crate) best: BestRecord,
    pub(crate) stats: StepStats,
    pub(crate) history: FitnessHistory,
    pub(crate) interrupt: InterruptFlag,
}

impl OptimizerState {
    pub(crate) fn new(info: FitnessInfo, dim: usize, history_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            info,
            dim,
            step_count: 0,
            status: OptimizerStatus::NotStarted,
            best: BestRecord::new(&info, dim),
            stats: StepStats::new(&info, dim),
            history: FitnessHistory::new(history_capacity),
            interrupt: InterruptFlag::new(),
        }
    }

    /// Run identifier, used in log output.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn info(&self) -> &FitnessInfo {
        &self.info
    }

    /// Number of free parameters of the objective.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn status(&self) -> OptimizerStatus {
        self.status
    }

    pub fn best(&self) -> &BestRecord {
        &self.best
    }

    pub fn best_fitness(&self) -> Fitness {
        self.best.fitness
    }

    pub fn best_point(&self) -> &SearchPoint {
        &self.best.point
    }

    pub fn step_stats(&self) -> &StepStats {
        &self.stats
    }

    pub fn current_step_best(&self) -> Fitness {
        self.stats.best
    }

    pub fn current_step_median(&self) -> Fitness {
        self.stats.median
    }

    pub fn current_step_average(&self) -> Fitness {
        self.stats.top_average
    }

    pub fn current_step_best_point(&self) -> &SearchPoint {
        &self.stats.best_point
    }

    pub fn history(&self) -> &FitnessHistory {
        &self.history
    }

    pub fn interrupt_requested(&self) -> bool {
        self.interrupt.is_raised()
    }

    pub fn fitness_trend(&self) -> LinearFunction {
        self.history.trend()
    }

    /// Unitless convergence signal; positive while improving.
    pub fn progress(&self) -> Result<f64, UsageError> {
        self.history.progress(self.info.is_minimizing())
    }

    pub fn predicted_fitness(&self, step: usize) -> Result<f64, UsageError> {
        self.history.predicted_fitness(step)
    }
}
