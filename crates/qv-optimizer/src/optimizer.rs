//! The optimizer control loop.

use std::sync::Arc;

use qv_types::{
    ConfigError, FitnessInfo, FitnessVec, InterruptFlag, Objective, QvResult, SearchPoint,
    ThreadPriority, UsageError,
};
use tracing::{debug, error, info, warn};

use crate::config::OptimizerConfig;
use crate::engine::{self, EvaluationEngine};
use crate::state::{OptimizerState, OptimizerStatus};
use crate::stats::StepStats;
use crate::stop::{AbortCondition, StopCondition, StopReason};
use crate::reporter::Reporter;
use crate::strategy::SearchStrategy;

/// Builder for [`Optimizer`].
pub struct OptimizerBuilder {
    objective: Arc<dyn Objective>,
    strategy: Box<dyn SearchStrategy>,
    config: OptimizerConfig,
    engine: Option<Box<dyn EvaluationEngine>>,
    stop_conditions: Vec<Box<dyn StopCondition>>,
    reporters: Vec<Box<dyn Reporter>>,
}

impl OptimizerBuilder {
    pub fn new(objective: Arc<dyn Objective>, strategy: impl SearchStrategy + 'static) -> Self {
        Self {
            objective,
            strategy: Box::new(strategy),
            config: OptimizerConfig::default(),
            engine: None,
            stop_conditions: Vec::new(),
            reporters: Vec::new(),
        }
    }

    pub fn config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom engine instead of the one selected by the config.
    pub fn engine(mut self, engine: Box<dyn EvaluationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn stop_condition(mut self, condition: impl StopCondition + 'static) -> Self {
        self.stop_conditions.push(Box::new(condition));
        self
    }

    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn build(self) -> QvResult<Optimizer> {
        let dim = self.objective.dim();
        if dim == 0 {
            return Err(ConfigError::NoFreeParameters.into());
        }
        self.config.validate()?;

        let history_capacity = self.config.fitness_history_capacity;
        for condition in &self.stop_conditions {
            check_history(condition.as_ref(), history_capacity)?;
        }

        let engine = match self.engine {
            Some(engine) => engine,
            None => engine::build(&self.config)?,
        };

        let info = self.objective.info();
        let state = OptimizerState::new(info, dim, history_capacity);

        let mut stop_conditions: Vec<Box<dyn StopCondition>> = vec![Box::new(AbortCondition)];
        stop_conditions.extend(self.stop_conditions);

        info!(
            run = %state.id(),
            dim,
            engine = engine.name(),
            max_threads = engine.max_threads(),
            strategy = self.strategy.name(),
            "optimizer created"
        );

        Ok(Optimizer {
            state,
            objective: self.objective,
            strategy: self.strategy,
            engine,
            stop_conditions,
            reporters: self.reporters,
        })
    }
}

fn check_history(condition: &dyn StopCondition, capacity: usize) -> Result<(), ConfigError> {
    if condition.requires_history() && capacity == 0 {
        return Err(ConfigError::HistoryRequired {
            condition: condition.what(),
        });
    }
    Ok(())
}

/// Drives a [`SearchStrategy`] step by step, evaluating each population
/// through an [`EvaluationEngine`].
///
/// Each [`Optimizer::step`] tests the stop conditions, notifies reporters,
/// asks the strategy for a population, evaluates it and updates the best
/// record, step statistics and fitness history. Steps run sequentially on
/// the caller's thread; only the evaluations inside a step run in parallel.
pub struct Optimizer {
    state: OptimizerState,
    objective: Arc<dyn Objective>,
    strategy: Box<dyn SearchStrategy>,
    engine: Box<dyn EvaluationEngine>,
    stop_conditions: Vec<Box<dyn StopCondition>>,
    reporters: Vec<Box<dyn Reporter>>,
}

impl Optimizer {
    pub fn builder(
        objective: Arc<dyn Objective>,
        strategy: impl SearchStrategy + 'static,
    ) -> OptimizerBuilder {
        OptimizerBuilder::new(objective, strategy)
    }

    pub fn new(
        objective: Arc<dyn Objective>,
        strategy: impl SearchStrategy + 'static,
        config: OptimizerConfig,
    ) -> QvResult<Self> {
        OptimizerBuilder::new(objective, strategy).config(config).build()
    }

    pub fn add_stop_condition(&mut self, condition: impl StopCondition + 'static) -> QvResult<()> {
        check_history(&condition, self.state.history.capacity())?;
        self.stop_conditions.push(Box::new(condition));
        Ok(())
    }

    pub fn add_reporter(&mut self, reporter: impl Reporter + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    pub fn info(&self) -> &FitnessInfo {
        self.state.info()
    }

    pub fn objective(&self) -> &Arc<dyn Objective> {
        &self.objective
    }

    pub fn engine(&self) -> &dyn EvaluationEngine {
        self.engine.as_ref()
    }

    pub fn step_count(&self) -> usize {
        self.state.step_count
    }

    pub fn best_fitness(&self) -> f64 {
        self.state.best.fitness
    }

    pub fn best_point(&self) -> &SearchPoint {
        &self.state.best.point
    }

    /// Handle that stops the run at the next step when raised.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.state.interrupt.clone()
    }

    pub fn progress(&self) -> Result<f64, UsageError> {
        self.state.progress()
    }

    pub fn predicted_fitness(&self, step: usize) -> Result<f64, UsageError> {
        self.state.predicted_fitness(step)
    }

    /// Reconfigure the engine. Only call between steps.
    pub fn set_max_threads(&mut self, count: usize, priority: ThreadPriority) -> QvResult<()> {
        self.engine.set_max_threads(count, priority)
    }

    /// Run one step. Returns the matching stop condition instead of running
    /// when the optimizer should stop.
    pub fn step(&mut self) -> Option<StopReason> {
        if let Some(reason) = self.test_stop_conditions() {
            return Some(reason);
        }

        if self.state.status == OptimizerStatus::NotStarted {
            for reporter in &mut self.reporters {
                reporter.start(&self.state);
            }
        }
        self.state.status = OptimizerStatus::Running;

        let step = self.state.step_count;
        for reporter in &mut self.reporters {
            reporter.next_step(&self.state, step);
        }

        let population = self.strategy.suggest(&self.state);
        let results = self.evaluate(&population);
        self.strategy.report(&population, &results);
        self.state.step_count += 1;

        None
    }

    /// Run up to `number_of_steps` steps (unbounded when 0). Returns the stop
    /// condition that ended the run, or `None` when the steps ran out.
    pub fn run(&mut self, number_of_steps: usize) -> Option<StopReason> {
        let limit = if number_of_steps == 0 {
            usize::MAX
        } else {
            number_of_steps
        };

        for _ in 0..limit {
            if let Some(reason) = self.step() {
                return Some(reason);
            }
        }
        None
    }

    /// First matching stop condition, in registration order. Reporters get
    /// `finish` when the optimizer transitions to stopped.
    pub fn test_stop_conditions(&mut self) -> Option<StopReason> {
        let state = &self.state;
        let reason = self
            .stop_conditions
            .iter_mut()
            .enumerate()
            .find_map(|(index, condition)| {
                condition.test(state).then(|| StopReason {
                    index,
                    what: condition.what(),
                })
            })?;

        if self.state.status != OptimizerStatus::Stopped {
            self.state.status = OptimizerStatus::Stopped;
            info!(
                run = %self.state.id(),
                step = self.state.step_count,
                reason = %reason.what,
                "optimization stopped"
            );
            for reporter in &mut self.reporters {
                reporter.finish(&self.state);
            }
        }
        Some(reason)
    }

    /// Evaluate a population and fold the results into the best record, step
    /// statistics and fitness history.
    ///
    /// The returned vector is index-aligned with `population`. Candidates
    /// that failed, or were never evaluated, hold the worst possible fitness.
    /// A failure of the dispatch machinery is logged and the partially filled
    /// vector is returned without touching the best record.
    pub fn evaluate(&mut self, population: &[SearchPoint]) -> FitnessVec {
        let info = self.state.info;
        let mut results = vec![info.worst_fitness(); population.len()];
        if population.is_empty() {
            debug!(run = %self.state.id(), "empty population, nothing to evaluate");
            return results;
        }

        let Self {
            state,
            objective,
            engine,
            reporters,
            ..
        } = self;

        let mut failures = 0usize;
        let dispatched = engine.dispatch(objective, population, &state.interrupt, &mut |idx, outcome| {
            let fitness = match outcome {
                Ok(fitness) => fitness,
                Err(e) => {
                    failures += 1;
                    warn!(run = %state.id, candidate = idx, error = %e, "candidate evaluation failed");
                    info.worst_fitness()
                }
            };
            results[idx] = fitness;
            for reporter in reporters.iter_mut() {
                reporter.evaluate_point(state, &population[idx], fitness);
            }
        });

        if let Err(e) = dispatched {
            error!(
                run = %state.id,
                severity = "critical",
                error = %e,
                "error during multi-threaded evaluation"
            );
            return results;
        }
        if failures > 0 {
            debug!(run = %state.id, failures, candidates = population.len(), "batch had failed candidates");
        }

        let Some(best_idx) = info.find_best_fitness(&results) else {
            return results;
        };
        let new_best = state.best.update(&info, &population[best_idx], results[best_idx]);

        state.stats = StepStats::compute(&info, population, &results, best_idx);
        state.history.push(state.stats.top_average);

        // after the best record is updated
        for reporter in reporters.iter_mut() {
            reporter.evaluate_population(state, population, &results, best_idx, new_best);
            if new_best {
                reporter.new_best(state, &state.best.point, state.best.fitness);
            }
        }

        results
    }
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("state", &self.state)
            .field("strategy", &self.strategy.name())
            .field("engine", &self.engine.name())
            .field("stop_conditions", &self.stop_conditions.len())
            .field("reporters", &self.reporters.len())
            .finish()
    }
}
