//! Persistent worker threads shared by every batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use qv_types::{
    evaluate_guarded, ConfigError, DispatchError, EvalOutcome, EvaluationError, InterruptFlag,
    Objective, QvResult, SearchPoint, ThreadPriority,
};
use tracing::{debug, trace, warn};

use super::EvaluationEngine;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads pulling evaluation tasks from one shared
/// queue.
///
/// The queue is a multi-consumer channel and is served first-in-first-out.
/// Dropping the sending half is the stop signal: idle workers wake up and
/// exit, a worker busy with a task finishes it first. Every task sends its
/// outcome on its own one-shot channel, so the caller can collect results in
/// population order no matter which worker ran what.
pub struct WorkerPool {
    max_threads: usize,
    priority: ThreadPriority,
    queue: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(max_threads: usize, priority: ThreadPriority) -> QvResult<Self> {
        if max_threads == 0 {
            return Err(ConfigError::ZeroThreads.into());
        }
        let mut pool = Self {
            max_threads,
            priority,
            queue: None,
            workers: Vec::with_capacity(max_threads),
            live: Arc::new(AtomicUsize::new(0)),
        };
        pool.start_threads()?;
        Ok(pool)
    }

    /// Number of worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn start_threads(&mut self) -> Result<(), DispatchError> {
        if !self.workers.is_empty() {
            self.stop_threads();
        }

        let (tx, rx) = unbounded::<Task>();
        for id in 0..self.max_threads {
            let rx = rx.clone();
            let live = Arc::clone(&self.live);
            let priority = self.priority;

            live.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("qv-worker-{id}"))
                .spawn(move || worker_loop(id, rx, priority, live));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    self.live.fetch_sub(1, Ordering::SeqCst);
                    // workers started so far see the dropped sender and exit
                    return Err(DispatchError::Spawn {
                        message: e.to_string(),
                    });
                }
            }
        }

        self.queue = Some(tx);
        debug!(threads = self.max_threads, priority = ?self.priority, "worker pool started");
        Ok(())
    }

    fn stop_threads(&mut self) {
        // closing the queue is the stop signal
        self.queue = None;
        while let Some(handle) = self.workers.pop() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        debug!("worker pool stopped");
    }
}

fn worker_loop(id: usize, tasks: Receiver<Task>, priority: ThreadPriority, live: Arc<AtomicUsize>) {
    struct LiveGuard(Arc<AtomicUsize>);
    impl Drop for LiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
    let _guard = LiveGuard(live);

    priority.apply();
    trace!(worker = id, "starting worker");
    while let Ok(task) = tasks.recv() {
        task();
    }
    trace!(worker = id, "stopping worker");
}

impl EvaluationEngine for WorkerPool {
    fn name(&self) -> &str {
        "pool"
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
        _interrupt: &InterruptFlag,
        on_result: &mut dyn FnMut(usize, EvalOutcome),
    ) -> Result<(), DispatchError> {
        let queue = self.queue.as_ref().ok_or(DispatchError::PoolStopped)?;

        let mut tasks: Vec<Task> = Vec::with_capacity(population.len());
        let mut handles: Vec<Receiver<EvalOutcome>> = Vec::with_capacity(population.len());
        for point in population {
            let (tx, rx) = bounded::<EvalOutcome>(1);
            let objective = Arc::clone(objective);
            let point = point.clone();
            tasks.push(Box::new(move || {
                let _ = tx.send(evaluate_guarded(objective.as_ref(), &point));
            }));
            handles.push(rx);
        }

        for task in tasks {
            queue.send(task).map_err(|_| DispatchError::PoolStopped)?;
        }
        trace!(tasks = population.len(), "queued evaluation batch");

        for (idx, handle) in handles.into_iter().enumerate() {
            let outcome = handle.recv().unwrap_or(Err(EvaluationError::Abandoned));
            on_result(idx, outcome);
        }
        Ok(())
    }

    fn set_max_threads(&mut self, count: usize, priority: ThreadPriority) -> QvResult<()> {
        if count == 0 {
            return Err(ConfigError::ZeroThreads.into());
        }
        if self.max_threads != count || self.priority != priority {
            self.max_threads = count;
            self.priority = priority;
            self.stop_threads();
            self.start_threads()?;
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_threads", &self.max_threads)
            .field("priority", &self.priority)
            .field("live_workers", &self.live_workers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{population_1d, sleeping_objective, ConcurrencyProbe};
    use qv_types::{FitnessInfo, FnObjective};
    use std::time::{Duration, Instant};

    #[test]
    fn single_thread_serializes_batch() {
        let objective = sleeping_objective();
        let population = population_1d(&[40.0; 4]);
        let pool = WorkerPool::new(1, ThreadPriority::Lowest).unwrap();

        let start = Instant::now();
        let outcomes = pool.evaluate(&objective, &population).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 4);
        assert!(elapsed >= Duration::from_millis(160), "elapsed {elapsed:?}");
    }

    #[test]
    fn one_thread_per_task_runs_in_parallel() {
        let objective = sleeping_objective();
        let population = population_1d(&[40.0, 80.0, 40.0, 40.0]);
        let pool = WorkerPool::new(4, ThreadPriority::Lowest).unwrap();

        let start = Instant::now();
        let outcomes = pool.evaluate(&objective, &population).unwrap();
        let elapsed = start.elapsed();

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert!(elapsed >= Duration::from_millis(80));
        // serialized would take 200ms
        assert!(elapsed < Duration::from_millis(190), "elapsed {elapsed:?}");
    }

    #[test]
    fn pool_is_reused_across_batches() {
        let probe = ConcurrencyProbe::new(Duration::from_millis(2));
        let objective = probe.objective();
        let pool = WorkerPool::new(2, ThreadPriority::Lowest).unwrap();

        for _ in 0..5 {
            let outcomes = pool.evaluate(&objective, &population_1d(&[0.0; 6])).unwrap();
            assert_eq!(outcomes.len(), 6);
        }
        assert_eq!(probe.calls(), 30);
        assert!(probe.high_water_mark() <= 2);
        assert_eq!(pool.live_workers(), 2);
    }

    #[test]
    fn reconfiguration_restarts_workers() {
        let mut pool = WorkerPool::new(3, ThreadPriority::Lowest).unwrap();
        assert_eq!(pool.live_workers(), 3);

        pool.set_max_threads(5, ThreadPriority::Lowest).unwrap();
        assert_eq!(pool.live_workers(), 5);
        assert_eq!(pool.workers.len(), 5);

        pool.set_max_threads(1, ThreadPriority::High).unwrap();
        assert_eq!(pool.live_workers(), 1);
        assert_eq!(pool.thread_priority(), ThreadPriority::High);

        let objective: Arc<dyn Objective> =
            Arc::new(FnObjective::new(1, FitnessInfo::minimize(), |_| {
                if ThreadPriority::current() == Some(ThreadPriority::High) { 1.0 } else { 0.0 }
            }));
        let outcomes = pool.evaluate(&objective, &population_1d(&[0.0])).unwrap();
        assert_eq!(outcomes, vec![Ok(1.0)]);
    }

    #[test]
    fn drop_joins_every_worker() {
        let pool = WorkerPool::new(4, ThreadPriority::Lowest).unwrap();
        let live = Arc::clone(&pool.live);
        drop(pool);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_are_isolated_per_candidate() {
        let objective: Arc<dyn Objective> = Arc::new(FnObjective::fallible(
            1,
            FitnessInfo::maximize(),
            |x| {
                if x[0] < 0.0 {
                    panic!("negative input");
                }
                Ok(x[0])
            },
        ));
        let pool = WorkerPool::new(2, ThreadPriority::Lowest).unwrap();

        let outcomes = pool.evaluate(&objective, &population_1d(&[1.0, -1.0, 2.0])).unwrap();
        assert_eq!(outcomes[0], Ok(1.0));
        assert!(matches!(outcomes[1], Err(EvaluationError::Panicked { .. })));
        assert_eq!(outcomes[2], Ok(2.0));

        // the worker that hit the panic is still serving
        assert_eq!(pool.live_workers(), 2);
        let again = pool.evaluate(&objective, &population_1d(&[3.0, 4.0])).unwrap();
        assert_eq!(again, vec![Ok(3.0), Ok(4.0)]);
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(WorkerPool::new(0, ThreadPriority::Lowest).is_err());
    }
}
