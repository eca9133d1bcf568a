//! Background maintenance: periodic cleanup plus snapshot flushes, and the
//! final flush on shutdown.

pub mod config;
pub mod error;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_MAINTENANCE_INTERVAL_SECS, MaintenanceConfig};
pub use error::{LifecycleError, LifecycleResult};
pub use scheduler::MaintenanceScheduler;
