//! Objectives and helpers shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use qv_types::{FitnessInfo, FnObjective, Objective, SearchPoint};

pub fn population_1d(values: &[f64]) -> Vec<SearchPoint> {
    values.iter().map(|&v| SearchPoint::new(vec![v])).collect()
}

/// Sleeps `x` milliseconds, returns `x`.
pub fn sleeping_objective() -> Arc<dyn Objective> {
    Arc::new(FnObjective::new(1, FitnessInfo::minimize(), |x| {
        thread::sleep(Duration::from_millis(x[0] as u64));
        x[0]
    }))
}

/// Larger inputs finish sooner; returns `10 * x`.
pub fn delayed_objective() -> Arc<dyn Objective> {
    Arc::new(FnObjective::new(1, FitnessInfo::minimize(), |x| {
        let delay = (12.0 - x[0]).max(0.0) as u64;
        thread::sleep(Duration::from_millis(delay));
        x[0] * 10.0
    }))
}

/// Records how many evaluations overlap in time.
#[derive(Clone)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Self {
        Self {
            current: Arc::new(AtomicUsize::new(0)),
            high_water: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            hold,
        }
    }

    pub fn objective(&self) -> Arc<dyn Objective> {
        let probe = self.clone();
        Arc::new(FnObjective::new(1, FitnessInfo::minimize(), move |x| {
            let now = probe.current.fetch_add(1, Ordering::SeqCst) + 1;
            probe.high_water.fetch_max(now, Ordering::SeqCst);
            probe.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(probe.hold);
            probe.current.fetch_sub(1, Ordering::SeqCst);
            x[0]
        }))
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
