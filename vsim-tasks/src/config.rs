//! Task engine tuning

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Task engine configuration, injected at construction.
///
/// `lock_handoff` controls what happens to the target entity's lock between
/// `Task::run` and the start of the work body:
///
/// - `true` (default): the lock is taken under the caller's context before
///   the worker is launched and released only after the body returns. The
///   entity is frozen from the caller's point of view, at the cost of
///   blocking readers (including property collector queries) for the whole
///   delay window.
/// - `false`: the worker takes the lock under its own context once its
///   delay has elapsed. Readers stay unblocked during the delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_lock_handoff")]
    pub lock_handoff: bool,

    /// Delay applied to every task before its body runs
    #[serde(default)]
    pub delay_ms: u64,

    /// Per-task delay overrides, keyed by task name (e.g. `PowerOnVM_Task`)
    #[serde(default)]
    pub method_delay: HashMap<String, u64>,

    /// Coefficient of variation applied to delays (0 disables jitter)
    #[serde(default)]
    pub delay_jitter: f64,

    /// How many task references the manager remembers as recent
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_lock_handoff() -> bool {
    true
}

fn default_recent_limit() -> usize {
    50
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            lock_handoff: default_lock_handoff(),
            delay_ms: 0,
            method_delay: HashMap::new(),
            delay_jitter: 0.0,
            recent_limit: default_recent_limit(),
        }
    }
}

impl TaskConfig {
    /// Delay to apply before running the task called `name`
    pub fn delay_for(&self, name: &str) -> Duration {
        let base = self
            .method_delay
            .get(name)
            .copied()
            .unwrap_or(self.delay_ms) as f64;

        if base <= 0.0 {
            return Duration::ZERO;
        }

        let jittered = if self.delay_jitter > 0.0 {
            base + standard_normal() * self.delay_jitter * base
        } else {
            base
        };

        Duration::from_millis(jittered.max(0.0).round() as u64)
    }
}

/// Box-Muller sample from N(0, 1)
fn standard_normal() -> f64 {
    let u1 = fastrand::f64().max(f64::MIN_POSITIVE);
    let u2 = fastrand::f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
