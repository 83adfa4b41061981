//! Optimizer configuration.

use qv_types::{ConfigError, QvResult, ThreadPriority};
use serde::{Deserialize, Serialize};

/// Which evaluation engine drives each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// One short-lived thread per candidate, capped at `max_threads` in flight.
    Throttled,
    /// Persistent worker threads shared by every batch.
    Pool,
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Throttled
    }
}

/// Top-level configuration for an optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of objective evaluations running at once.
    pub max_threads: usize,

    /// Priority hint applied to every evaluation thread.
    pub thread_priority: ThreadPriority,

    pub engine: EngineKind,

    /// Number of per-step average fitness samples kept for trend estimation.
    /// Zero disables history tracking.
    pub fitness_history_capacity: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_threads: if cfg!(debug_assertions) { 1 } else { 32 },
            thread_priority: ThreadPriority::Lowest,
            engine: EngineKind::Throttled,
            fitness_history_capacity: 0,
        }
    }
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> QvResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| qv_types::config_error!("optimizer config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn with_thread_priority(mut self, priority: ThreadPriority) -> Self {
        self.thread_priority = priority;
        self
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_fitness_history(mut self, capacity: usize) -> Self {
        self.fitness_history_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }
}
