//! Per-batch dispatch with a cap on concurrently running evaluations.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use qv_types::{
    evaluate_guarded, ConfigError, DispatchError, EvalOutcome, InterruptFlag, Objective, QvResult,
    SearchPoint, ThreadPriority,
};
use tracing::{debug, trace};

use super::EvaluationEngine;

/// Spawns one scoped thread per candidate, never more than `max_threads` at
/// a time.
///
/// Finished tasks report on a completion channel; the dispatching thread
/// blocks on it whenever the in-flight set is full, so no thread is created
/// until a slot frees up. The in-flight set lives entirely on the
/// dispatching thread.
#[derive(Debug, Clone)]
pub struct ThrottledDispatcher {
    max_threads: usize,
    priority: ThreadPriority,
}

impl ThrottledDispatcher {
    pub fn new(max_threads: usize, priority: ThreadPriority) -> Result<Self, ConfigError> {
        if max_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(Self {
            max_threads,
            priority,
        })
    }
}

impl EvaluationEngine for ThrottledDispatcher {
    fn name(&self) -> &str {
        "throttled"
    }

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn thread_priority(&self) -> ThreadPriority {
        self.priority
    }

    fn dispatch(
        &self,
        objective: &Arc<dyn Objective>,
        population: &[SearchPoint],
        interrupt: &InterruptFlag,
        on_result: &mut dyn FnMut(usize, EvalOutcome),
    ) -> Result<(), DispatchError> {
        let objective: &dyn Objective = objective.as_ref();
        let priority = self.priority;
        let (done_tx, done_rx) = unbounded::<(usize, EvalOutcome)>();

        thread::scope(|scope| {
            let mut in_flight = 0usize;
            let mut launch_error = None;

            for (idx, point) in population.iter().enumerate() {
                // make room for the next task
                while in_flight >= self.max_threads {
                    match done_rx.recv() {
                        Ok((i, outcome)) => {
                            in_flight -= 1;
                            on_result(i, outcome);
                        }
                        Err(_) => in_flight = 0,
                    }
                }

                if interrupt.is_raised() {
                    debug!(launched = idx, total = population.len(), "interrupt raised, no new evaluations");
                    break;
                }

                let done_tx = done_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("qv-eval-{idx}"))
                    .spawn_scoped(scope, move || {
                        priority.apply();
                        let outcome = evaluate_guarded(objective, point);
                        // the receiver outlives every task in this scope
                        let _ = done_tx.send((idx, outcome));
                    });

                match spawned {
                    Ok(_) => {
                        in_flight += 1;
                        trace!(candidate = idx, in_flight, "launched evaluation");
                    }
                    Err(e) => {
                        launch_error = Some(DispatchError::Spawn {
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
            drop(done_tx);

            // wait for remaining tasks
            while in_flight > 0 {
                match done_rx.recv() {
                    Ok((i, outcome)) => {
                        in_flight -= 1;
                        on_result(i, outcome);
                    }
                    Err(_) => break,
                }
            }

            match launch_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn set_max_threads(&mut self, count: usize, priority: ThreadPriority) -> QvResult<()> {
        if count == 0 {
            return Err(ConfigError::ZeroThreads.into());
        }
        self.max_threads = count;
        self.priority = priority;
        Ok(())
    }
}
