use std::time::Duration;

use super::error::{LifecycleError, LifecycleResult};

/// Default time between maintenance passes (one day).
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Scheduling for the maintenance task.
pub struct MaintenanceConfig {
    /// Time between passes.
    pub interval: Duration,
    /// If false, [`super::MaintenanceScheduler::start`] does not spawn anything.
    pub enabled: bool,
    /// Run one pass immediately instead of waiting a full interval.
    pub run_on_start: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_MAINTENANCE_INTERVAL_SECS),
            enabled: true,
            run_on_start: false,
        }
    }
}

impl MaintenanceConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn validate(&self) -> LifecycleResult<()> {
        if self.enabled && self.interval.is_zero() {
            return Err(LifecycleError::Config(
                "maintenance interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_testing(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            run_on_start: true,
        }
    }
}
