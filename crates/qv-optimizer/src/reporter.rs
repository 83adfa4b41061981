//! Lifecycle observers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use qv_types::{Fitness, QvResult, SearchPoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::state::OptimizerState;

/// Observer notified of optimizer lifecycle events, in registration order.
///
/// Every callback has an empty default so implementors only override what
/// they need.
pub trait Reporter: Send {
    /// Before the first step.
    fn start(&mut self, _state: &OptimizerState) {}

    /// At the start of each step, with the index of the step about to run.
    fn next_step(&mut self, _state: &OptimizerState, _step: usize) {}

    /// As each candidate's result is collected, possibly in completion order.
    fn evaluate_point(&mut self, _state: &OptimizerState, _point: &SearchPoint, _fitness: Fitness) {}

    /// After a whole population is evaluated and the best record updated.
    fn evaluate_population(
        &mut self,
        _state: &OptimizerState,
        _population: &[SearchPoint],
        _results: &[Fitness],
        _best_idx: usize,
        _new_best: bool,
    ) {
    }

    /// When the best-ever record improves.
    fn new_best(&mut self, _state: &OptimizerState, _point: &SearchPoint, _fitness: Fitness) {}

    /// When a stop condition ends the run.
    fn finish(&mut self, _state: &OptimizerState) {}
}

/// Writes lifecycle events to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn start(&mut self, state: &OptimizerState) {
        info!(run = %state.id(), dim = state.dim(), "optimization started");
    }

    fn next_step(&mut self, state: &OptimizerState, step: usize) {
        debug!(run = %state.id(), step, "starting step");
    }

    fn evaluate_point(&mut self, _state: &OptimizerState, point: &SearchPoint, fitness: Fitness) {
        trace!(%point, fitness, "candidate evaluated");
    }

    fn evaluate_population(
        &mut self,
        state: &OptimizerState,
        population: &[SearchPoint],
        _results: &[Fitness],
        _best_idx: usize,
        new_best: bool,
    ) {
        debug!(
            run = %state.id(),
            step = state.step_count(),
            candidates = population.len(),
            best = state.current_step_best(),
            median = state.current_step_median(),
            average = state.current_step_average(),
            new_best,
            "step evaluated"
        );
    }

    fn new_best(&mut self, state: &OptimizerState, point: &SearchPoint, fitness: Fitness) {
        info!(run = %state.id(), step = state.step_count(), fitness, %point, "new best");
    }

    fn finish(&mut self, state: &OptimizerState) {
        info!(
            run = %state.id(),
            steps = state.step_count(),
            best = state.best_fitness(),
            "optimization finished"
        );
    }
}

/// Summary of one evaluated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub evaluations: usize,
    pub step_best: Fitness,
    pub median: Fitness,
    pub top_average: Fitness,
    pub best_fitness: Fitness,
    pub new_best: bool,
}

/// Appends a [`StepRecord`] per step to a buffer the host can read while
/// the run is in progress.
#[derive(Debug, Clone, Default)]
pub struct HistoryReporter {
    records: Arc<Mutex<Vec<StepRecord>>>,
}

impl HistoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded steps.
    pub fn handle(&self) -> Arc<Mutex<Vec<StepRecord>>> {
        Arc::clone(&self.records)
    }

    /// Snapshot of the records so far.
    pub fn records(&self) -> Vec<StepRecord> {
        self.records.lock().clone()
    }

    pub fn to_json(&self) -> QvResult<String> {
        Ok(serde_json::to_string(&*self.records.lock())?)
    }
}

impl Reporter for HistoryReporter {
    fn evaluate_population(
        &mut self,
        state: &OptimizerState,
        population: &[SearchPoint],
        _results: &[Fitness],
        _best_idx: usize,
        new_best: bool,
    ) {
        self.records.lock().push(StepRecord {
            step: state.step_count(),
            timestamp: Utc::now(),
            evaluations: population.len(),
            step_best: state.current_step_best(),
            median: state.current_step_median(),
            top_average: state.current_step_average(),
            best_fitness: state.best_fitness(),
            new_best,
        });
    }
}
