use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Property collector tuning, injected at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// How often a blocked wait drains buffered registry changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-response cap on object updates; requests may only lower it
    #[serde(default = "default_max_object_updates")]
    pub max_object_updates: usize,
}

fn default_poll_interval_ms() -> u64 {
    20
}

fn default_max_object_updates() -> usize {
    100
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_object_updates: default_max_object_updates(),
        }
    }
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Effective cap for one response
    pub(crate) fn max_updates(&self, requested: Option<usize>) -> usize {
        let cap = self.max_object_updates.max(1);
        match requested {
            Some(n) if n > 0 && n < cap => n,
            _ => cap,
        }
    }
}
