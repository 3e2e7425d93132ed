//! # Proof Job Poller
//!
//! Background worker that asks the proof service about every pending job
//! and reports the answer through [`TransactionService`], so aggregations
//! trigger threshold re-evaluation.
//!
//! One job's failure never stops the batch: it is logged, counted and the
//! job stays pending for the next tick.
//!
//! A job that reached `Aggregated` is no longer pending, so if the recount
//! after it failed, listing pending jobs would never bring it back. Every
//! pass therefore also recounts the stalled transactions the store reports.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use zkms_client::{JobOutcome, ProofSubmissionService};
use zkms_state::ProofJob;

use crate::error::Result;
use crate::service::TransactionService;

/// What one polling pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub checked: usize,
    pub aggregated: usize,
    pub failed: usize,
    pub still_pending: usize,
    /// Stalled transactions recounted.
    pub reevaluated: usize,
    pub errors: usize,
}

enum JobUpdate {
    Aggregated,
    Failed,
    Pending,
}

pub struct ProofJobPoller {
    service: Arc<TransactionService>,
    prover: Arc<dyn ProofSubmissionService>,
    batch_size: usize,
    interval: Duration,
}

impl ProofJobPoller {
    pub fn new(
        service: Arc<TransactionService>,
        prover: Arc<dyn ProofSubmissionService>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            prover,
            batch_size,
            interval,
        }
    }

    /// Check up to `batch_size` pending jobs, oldest first, then recount up
    /// to `batch_size` stalled transactions.
    ///
    /// Only failing to list jobs or transactions is an error.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let jobs = self.service.tracker().pending(self.batch_size).await?;
        let mut report = PollReport {
            checked: jobs.len(),
            ..PollReport::default()
        };
        for job in &jobs {
            match self.check(job).await {
                Ok(JobUpdate::Aggregated) => report.aggregated += 1,
                Ok(JobUpdate::Failed) => report.failed += 1,
                Ok(JobUpdate::Pending) => report.still_pending += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(
                        job_id = %job.id,
                        external_id = %job.external_id,
                        error = %e,
                        "Proof job status check failed"
                    );
                }
            }
        }

        for tx_id in self.service.stalled_transactions(self.batch_size).await? {
            match self.service.reevaluate(tx_id).await {
                Ok(tx) => {
                    report.reevaluated += 1;
                    tracing::info!(tx_id = %tx_id, status = %tx.status, "Stalled transaction recounted");
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(tx_id = %tx_id, error = %e, "Stalled transaction recount failed");
                }
            }
        }

        if report.checked > 0 || report.reevaluated > 0 {
            tracing::debug!(
                checked = report.checked,
                aggregated = report.aggregated,
                failed = report.failed,
                reevaluated = report.reevaluated,
                errors = report.errors,
                "Proof job poll complete"
            );
        }
        Ok(report)
    }

    async fn check(&self, job: &ProofJob) -> Result<JobUpdate> {
        match self.prover.job_status(&job.external_id).await? {
            JobOutcome::Pending => Ok(JobUpdate::Pending),
            JobOutcome::Aggregated(artifact) => {
                self.service.record_aggregation(job.id, artifact).await?;
                Ok(JobUpdate::Aggregated)
            }
            JobOutcome::Failed(reason) => {
                self.service.mark_job_failed(job.id, reason).await?;
                Ok(JobUpdate::Failed)
            }
        }
    }

    /// Poll on every tick until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Starting proof job poller"
        );
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Error listing pending proof jobs");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Proof job poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
