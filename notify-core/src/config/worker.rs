//! Delivery worker configuration.

use std::time::Duration;

/// Tuning for one delivery worker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Maximum entries claimed per tick.
    pub batch_size: i64,
    /// Interval between polls when no wake-up arrives.
    pub poll_interval: Duration,
    /// How long an entry may stay PROCESSING before its lease is released.
    pub processing_timeout: Duration,
}

impl WorkerConfig {
    /// Longest a single dispatch may run. Half the processing timeout, so a
    /// lease renewed at dispatch start is still held at completion.
    pub fn dispatch_deadline(&self) -> Duration {
        self.processing_timeout / 2
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            processing_timeout: Duration::from_secs(300),
        }
    }
}
