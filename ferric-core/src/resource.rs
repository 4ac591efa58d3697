//! Resource Limits and Cancellation.
//!
//! Long-running engine loops poll a [`ResourceManager`] so that callers can
//! bound work by step count or wall-clock time, or cancel from another
//! thread. Hitting a limit is a soft condition: the polled loop returns
//! early with its invariants intact.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Limits on engine work.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Maximum number of polled work units (propagation rounds etc.).
    pub max_steps: Option<u64>,
    /// Wall-clock limit, measured from [`ResourceManager::start`].
    pub time_limit: Option<Duration>,
}

/// Outcome of a limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStatus {
    /// Within all limits.
    Ok,
    /// Canceled externally.
    Canceled,
    /// The step limit was exhausted.
    StepLimitExceeded,
    /// The time limit was exhausted.
    TimeLimitExceeded,
}

/// Tracks work done against a set of [`ResourceLimits`].
#[derive(Debug, Clone)]
pub struct ResourceManager {
    limits: ResourceLimits,
    steps: u64,
    started: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl ResourceManager {
    /// Create a manager with the given limits.
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            steps: 0,
            started: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a manager with no limits.
    pub fn unlimited() -> Self {
        Self::new(ResourceLimits::default())
    }

    /// Start (or restart) the wall clock.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Handle for canceling from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Clear the cancel flag.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Count one unit of work and report whether to keep going.
    pub fn inc(&mut self) -> bool {
        self.steps += 1;
        self.status() == LimitStatus::Ok
    }

    /// Check the current status without counting work.
    #[must_use]
    pub fn status(&self) -> LimitStatus {
        if self.cancel.load(Ordering::Relaxed) {
            return LimitStatus::Canceled;
        }
        if let Some(max) = self.limits.max_steps
            && self.steps >= max
        {
            return LimitStatus::StepLimitExceeded;
        }
        if let Some(limit) = self.limits.time_limit
            && let Some(started) = self.started
            && started.elapsed() >= limit
        {
            return LimitStatus::TimeLimitExceeded;
        }
        LimitStatus::Ok
    }

    /// Number of work units counted so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::unlimited()
    }
}
