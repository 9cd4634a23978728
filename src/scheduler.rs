//! # Sync Scheduler
//!
//! Background tick loop standing in for the external scheduler
//! collaborator. Each tick finds connections whose sync interval has
//! elapsed and invokes the one orchestrator entry point manual triggers
//! also use; the per-connection gate makes overlapping triggers safe. The
//! scheduler assumes nothing about invocation frequency beyond "may fire
//! at any time".

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use rand::Rng;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::AppConfig;
use crate::error::SyncError;
use crate::sync_executor::SyncExecutor;

/// Background scheduler service.
pub struct SyncScheduler {
    config: Arc<AppConfig>,
    executor: Arc<SyncExecutor>,
}

#[derive(Debug, Default)]
struct TickStats {
    connections_polled: u64,
    passes_succeeded: u64,
    passes_failed: u64,
    passes_skipped_running: u64,
}

impl SyncScheduler {
    /// Create a new scheduler instance.
    pub fn new(config: Arc<AppConfig>, executor: Arc<SyncExecutor>) -> Self {
        Self { config, executor }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), SyncError> {
        info!("Starting sync scheduler");
        let tick_interval = TokioDuration::from_secs(self.config.scheduler.tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync scheduler shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let tick_started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Scheduler tick failed");
                    }
                    let elapsed = tick_started.elapsed();
                    histogram!("bank_sync_scheduler_tick_duration_ms")
                        .record(elapsed.as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Execute one scheduler tick.
    pub async fn tick(&self) -> Result<(), SyncError> {
        let now = Utc::now();
        let mut stats = TickStats::default();

        let cutoff = now - Duration::seconds(self.config.scheduler.sync_interval_seconds as i64);
        let due = self.executor.connections().list_due(cutoff).await?;
        stats.connections_polled = due.len() as u64;

        let mut handles = Vec::new();
        for connection in due {
            let executor = self.executor.clone();
            let jitter = self.launch_jitter();

            // Passes for different connections are independent; spread their
            // start times a little to avoid a thundering herd at the bank.
            handles.push(tokio::spawn(async move {
                if jitter > TokioDuration::ZERO {
                    sleep(jitter).await;
                }
                let connection_id = connection.id;
                (connection_id, executor.run_sync(connection_id).await)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((_, Ok(_))) => stats.passes_succeeded += 1,
                Ok((connection_id, Err(SyncError::AlreadyRunning(_)))) => {
                    stats.passes_skipped_running += 1;
                    debug!(
                        connection_id = %connection_id,
                        "Sync already in progress, skipping scheduled pass"
                    );
                }
                Ok((connection_id, Err(err))) => {
                    stats.passes_failed += 1;
                    // The executor already recorded the error state and
                    // raised the alert; the scheduler only counts it.
                    debug!(connection_id = %connection_id, error = %err, "Scheduled pass failed");
                }
                Err(join_err) => {
                    stats.passes_failed += 1;
                    error!(error = ?join_err, "Scheduled pass panicked or was cancelled");
                }
            }
        }

        counter!("bank_sync_scheduled_passes_total").increment(stats.passes_succeeded);
        counter!("bank_sync_scheduled_failures_total").increment(stats.passes_failed);

        debug!(
            polled = stats.connections_polled,
            succeeded = stats.passes_succeeded,
            failed = stats.passes_failed,
            skipped_running = stats.passes_skipped_running,
            "Scheduler tick completed"
        );

        Ok(())
    }

    fn launch_jitter(&self) -> TokioDuration {
        let max_seconds = self.config.scheduler.tick_interval_seconds as f64
            * self.config.scheduler.jitter_pct_max;
        if max_seconds <= 0.0 {
            return TokioDuration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0.0..max_seconds);
        TokioDuration::from_secs_f64(jitter)
    }
}
