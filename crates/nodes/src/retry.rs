//! Executor-declared retry policy.
//!
//! Nodes may override [`ExecutableNode::retry_policy`] to tune how the
//! engine retries their `Transient` failures. The engine itself owns the
//! retry loop (see `engine::engine::Engine::dispatch_with_retry`); this
//! type only carries the knobs.

use std::time::Duration;

/// Retry tuning for a single node type.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `attempt`th retry (1-indexed).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }
}
