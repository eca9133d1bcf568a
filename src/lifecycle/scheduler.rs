use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Notify, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::knowledge::KnowledgeBackend;
use crate::responder::{MaintenanceReport, SmartResponder};

use super::config::MaintenanceConfig;
use super::error::{LifecycleError, LifecycleResult};

/// Runs [`SmartResponder::perform_maintenance`] on an interval and flushes the
/// store after each pass and once more on shutdown.
pub struct MaintenanceScheduler<B: KnowledgeBackend> {
    responder: SmartResponder<B>,
    config: MaintenanceConfig,
    last_report: Arc<RwLock<Option<MaintenanceReport>>>,
    passes: Arc<AtomicU64>,
    shutdown_initiated: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl<B: KnowledgeBackend> MaintenanceScheduler<B> {
    pub fn new(responder: SmartResponder<B>, config: MaintenanceConfig) -> LifecycleResult<Self> {
        config.validate()?;
        Ok(Self {
            responder,
            config,
            last_report: Arc::new(RwLock::new(None)),
            passes: Arc::new(AtomicU64::new(0)),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
        })
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Report of the most recent completed pass.
    pub async fn last_report(&self) -> Option<MaintenanceReport> {
        self.last_report.read().await.clone()
    }

    /// Completed passes since start.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// One maintenance pass followed by a flush.
    pub async fn run_once(&self) -> MaintenanceReport {
        run_pass(&self.responder, &self.last_report, &self.passes).await
    }

    /// Starts the background task (no-op if disabled or already running).
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        if !self.config.enabled {
            debug!("Maintenance scheduler disabled");
            return tokio::spawn(async {});
        }
        // AcqRel: only one task may observe `false` and start.
        if self.running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }

        let responder = self.responder.clone();
        let period = self.config.interval;
        let first = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let last_report = Arc::clone(&self.last_report);
        let passes = Arc::clone(&self.passes);
        let shutdown_initiated = Arc::clone(&self.shutdown_initiated);
        let running = Arc::clone(&self.running);
        let stop = Arc::clone(&self.stop);

        info!(interval_secs = period.as_secs(), "Maintenance scheduler started");

        tokio::spawn(async move {
            let mut interval = time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop.notified() => break,
                }
                if shutdown_initiated.load(Ordering::Acquire) {
                    break;
                }
                run_pass(&responder, &last_report, &passes).await;
            }

            debug!("Maintenance scheduler stopped");
            running.store(false, Ordering::Release);
        })
    }

    /// Stops the background task (idempotent) and flushes the store once.
    pub async fn shutdown(&self) -> LifecycleResult<()> {
        if self.shutdown_initiated.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // notify_one keeps a permit if the task is mid-pass.
        self.stop.notify_one();

        self.responder.flush().await.map_err(LifecycleError::Flush)?;
        info!("Knowledge store flushed on shutdown");
        Ok(())
    }
}

async fn run_pass<B: KnowledgeBackend>(
    responder: &SmartResponder<B>,
    last_report: &RwLock<Option<MaintenanceReport>>,
    passes: &AtomicU64,
) -> MaintenanceReport {
    let report = responder.perform_maintenance().await;

    if let Err(e) = responder.flush().await {
        warn!(error = %e, "Flush after maintenance failed");
    }

    *last_report.write().await = Some(report.clone());
    passes.fetch_add(1, Ordering::AcqRel);
    report
}
