//! Evaluation engines: fan a population out over worker threads and hand
//! every candidate's outcome back under its population index.

mod pool;
mod throttled;

use std::sync::Arc;

use qv_types::{
    DispatchError, EvalOutcome, EvaluationError, InterruptFlag, Objective, QvResult, SearchPoint,
    ThreadPriority,
};

use crate::config::{EngineKind, OptimizerConfig};

pub use pool::WorkerPool;
pub use throttled::ThrottledDispatcher;

/// Common interface of the concurrency strategies.
///
/// Both strategies must produce the same observable result: one outcome per
/// candidate, delivered with the candidate's index in `population`.
pub trait EvaluationEngine: Send {
    /// Human-readable engine name.
    fn name(&self) -> &str;

    fn max_threads(&self) -> usize;

    fn thread_priority(&self) -> ThreadPriority;

    /// Evaluate every candidate, calling `on_result(index, outcome)` once per
    /// collected result, in whatever order results are collected.
    ///
    /// A candidate's own failure is an `Err` outcome, never a dispatch error.
    /// Candidates that were not reported when this returns (interrupt,
    /// dispatch failure) were never evaluated.
    fn dispatch(
        &self,
        objective: &Arc<dyn Objective>,
        population: &[SearchPoint],
        interrupt: &InterruptFlag,
        on_result: &mut dyn FnMut(usize, EvalOutcome),
    ) -> Result<(), DispatchError>;

    /// Change thread count or priority. Must not be called while a batch is
    /// outstanding.
    fn set_max_threads(&mut self, count: usize, priority: ThreadPriority) -> QvResult<()>;

    /// Evaluate a whole population and return the outcomes index-aligned with
    /// it. Candidates that were never reported come back as
    /// [`EvaluationError::Abandoned`].
    fn evaluate(
        &self,
        objective: &Arc<dyn Objective>,
        population: &[SearchPoint],
    ) -> Result<Vec<EvalOutcome>, DispatchError> {
        let mut outcomes: Vec<EvalOutcome> = vec![Err(EvaluationError::Abandoned); population.len()];
        self.dispatch(objective, population, &InterruptFlag::new(), &mut |idx, outcome| {
            outcomes[idx] = outcome;
        })?;
        Ok(outcomes)
    }
}

/// Build the engine selected by `config`.
pub fn build(config: &OptimizerConfig) -> QvResult<Box<dyn EvaluationEngine>> {
    config.validate()?;
    let engine: Box<dyn EvaluationEngine> = match config.engine {
        EngineKind::Throttled => Box::new(ThrottledDispatcher::new(
            config.max_threads,
            config.thread_priority,
        )?),
        EngineKind::Pool => Box::new(WorkerPool::new(config.max_threads, config.thread_priority)?),
    };
    Ok(engine)
}
