//! Execution hints shared between the control loop and evaluation threads.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Scheduling hint applied to every evaluation thread.
///
/// The value is carried as configuration into each worker and recorded on
/// the thread that runs the evaluation; see [`ThreadPriority::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    Idle,
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

impl Default for ThreadPriority {
    fn default() -> Self {
        Self::Lowest
    }
}

thread_local! {
    static CURRENT_PRIORITY: Cell<Option<ThreadPriority>> = const { Cell::new(None) };
}

impl ThreadPriority {
    /// Apply this hint to the calling thread.
    pub fn apply(self) {
        CURRENT_PRIORITY.with(|p| p.set(Some(self)));
        tracing::trace!(priority = ?self, "thread priority applied");
    }

    /// Hint most recently applied on the calling thread, if any.
    pub fn current() -> Option<ThreadPriority> {
        CURRENT_PRIORITY.with(|p| p.get())
    }
}

/// Shared "please stop" signal raised from outside the control loop.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
