//! # qv-optimizer
//!
//! Control core of a black-box iterative optimizer.
//!
//! Provides the concurrent evaluation engines (throttled per-batch dispatch
//! and a persistent worker pool), the [`Optimizer`] control loop with stop
//! conditions and reporters, best-solution tracking, and the fitness trend
//! estimator used to judge convergence.

mod config;
pub mod engine;
mod history;
mod optimizer;
mod reporter;
mod state;
mod stats;
mod stop;
mod strategy;

pub use config::{EngineKind, OptimizerConfig};
pub use engine::{EvaluationEngine, ThrottledDispatcher, WorkerPool};
pub use history::{FitnessHistory, LinearFunction};
pub use optimizer::{Optimizer, OptimizerBuilder};
pub use reporter::{HistoryReporter, LogReporter, Reporter, StepRecord};
pub use state::{OptimizerState, OptimizerStatus};
pub use stats::{median, top_average, BestRecord, StepStats};
pub use stop::{
    AbortCondition, FlatFitnessCondition, MaxStepsCondition, MinProgressCondition,
    PredictedFitnessCondition, SimilarityCondition, StopCondition, StopReason,
};
pub use strategy::SearchStrategy;

#[cfg(test)]
pub(crate) mod test_support;
