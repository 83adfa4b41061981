//! The objective capability the optimizer evaluates candidates against.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::errors::{EvalOutcome, EvaluationError};
use crate::fitness::FitnessInfo;
use crate::point::SearchPoint;

/// User-supplied evaluator mapping a parameter vector to a fitness value.
///
/// Implementations are shared between evaluation threads, so they must be
/// `Send + Sync`. Returning an error (or panicking) only affects the one
/// candidate being evaluated.
pub trait Objective: Send + Sync {
    /// Number of free parameters.
    fn dim(&self) -> usize;

    /// Ordering semantics of this objective's fitness values.
    fn info(&self) -> FitnessInfo;

    /// Evaluate a single search point.
    fn evaluate(&self, point: &SearchPoint) -> EvalOutcome;
}

type ObjectiveFn = dyn Fn(&[f64]) -> EvalOutcome + Send + Sync;

/// Objective backed by a closure.
pub struct FnObjective {
    dim: usize,
    info: FitnessInfo,
    func: Box<ObjectiveFn>,
}

impl FnObjective {
    /// Wrap an infallible function.
    pub fn new<F>(dim: usize, info: FitnessInfo, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::fallible(dim, info, move |x| Ok(func(x)))
    }

    /// Wrap a function that may reject a candidate.
    pub fn fallible<F>(dim: usize, info: FitnessInfo, func: F) -> Self
    where
        F: Fn(&[f64]) -> EvalOutcome + Send + Sync + 'static,
    {
        Self {
            dim,
            info,
            func: Box::new(func),
        }
    }
}

impl std::fmt::Debug for FnObjective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObjective")
            .field("dim", &self.dim)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Objective for FnObjective {
    fn dim(&self) -> usize {
        self.dim
    }

    fn info(&self) -> FitnessInfo {
        self.info
    }

    fn evaluate(&self, point: &SearchPoint) -> EvalOutcome {
        (self.func)(point.values())
    }
}

/// Evaluate `point` without letting a failure escape: dimension mismatches
/// and panics inside the objective come back as [`EvaluationError`]s.
pub fn evaluate_guarded(objective: &dyn Objective, point: &SearchPoint) -> EvalOutcome {
    let expected = objective.dim();
    if point.len() != expected {
        return Err(EvaluationError::InvalidDimension {
            expected,
            actual: point.len(),
        });
    }

    match panic::catch_unwind(AssertUnwindSafe(|| objective.evaluate(point))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(EvaluationError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
