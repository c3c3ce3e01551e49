use crate::domain::job::{FulfillmentJob, JOB_TICKET_EMAIL};
use crate::error::JobError;
use crate::metrics::store_redis::{FulfillmentMetrics, JobOutcome};
use crate::queue::store_redis::JobQueue;
use crate::service::fulfillment::{FulfillmentOutcome, FulfillmentService};
use crate::service::retry_policy::{DropReason, RetryDecision, RetryPolicy};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct FulfillmentWorker {
    pub worker_id: String,
    pub queue: JobQueue,
    pub fulfillment: FulfillmentService,
    pub policy: RetryPolicy,
    pub metrics: FulfillmentMetrics,
    pub pop_timeout_secs: f64,
}

impl FulfillmentWorker {
    /// Pops until `shutdown` flips to true. Shutdown is only observed
    /// between pops, so a job in hand always finishes.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        tracing::info!(worker_id = %self.worker_id, queue = %self.queue.key, "fulfillment worker started");
        'connect: while !*shutdown.borrow() {
            let mut conn = match self.queue.dedicated_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, "queue connection failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            while !*shutdown.borrow() {
                match self.queue.pop_blocking(&mut conn, self.pop_timeout_secs).await {
                    Ok(Some(raw)) => {
                        self.process(&raw).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(worker_id = %self.worker_id, "queue pop failed, reconnecting: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue 'connect;
                    }
                }
            }
        }
        tracing::info!(worker_id = %self.worker_id, "fulfillment worker stopped");
    }

    pub async fn process(&self, raw: &str) -> JobOutcome {
        let outcome = match FulfillmentJob::decode(raw) {
            Ok(job) => self.execute(job).await,
            Err(e) => {
                tracing::error!(worker_id = %self.worker_id, payload = raw, "dropping job: {}", e);
                JobOutcome::DroppedFatal
            }
        };

        if let Err(e) = self.metrics.record(outcome).await {
            tracing::warn!(worker_id = %self.worker_id, "failed to record job outcome: {}", e);
        }
        outcome
    }

    async fn execute(&self, job: FulfillmentJob) -> JobOutcome {
        let err = match self.dispatch(&job).await {
            Ok(()) => return JobOutcome::Done,
            Err(err) => err,
        };

        let job_type = job.job_type.clone();
        let retry_count = job.retry_count;
        match self.policy.decide(job, &err) {
            RetryDecision::Requeue(job) => match self.queue.requeue(job).await {
                Ok(()) => {
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        job_type = %job_type,
                        retry_count,
                        "job failed, requeued: {}",
                        err
                    );
                    JobOutcome::Requeued
                }
                Err(e) => {
                    tracing::error!(
                        worker_id = %self.worker_id,
                        job_type = %job_type,
                        retry_count,
                        "job failed and could not be requeued: {} (requeue error: {})",
                        err,
                        e
                    );
                    JobOutcome::DroppedExhausted
                }
            },
            RetryDecision::Drop(DropReason::Fatal) => {
                tracing::error!(worker_id = %self.worker_id, job_type = %job_type, retry_count, "dropping job: {}", err);
                JobOutcome::DroppedFatal
            }
            RetryDecision::Drop(DropReason::Exhausted) => {
                tracing::error!(
                    worker_id = %self.worker_id,
                    job_type = %job_type,
                    retry_count,
                    "dropping job after {} retries: {}",
                    self.policy.max_retries,
                    err
                );
                JobOutcome::DroppedExhausted
            }
        }
    }

    async fn dispatch(&self, job: &FulfillmentJob) -> Result<(), JobError> {
        match job.job_type.as_str() {
            JOB_TICKET_EMAIL => {
                let registration_id = job.registration_id()?;
                match self.fulfillment.fulfill(registration_id).await? {
                    FulfillmentOutcome::Delivered { tickets, reused_tickets } => {
                        tracing::info!(
                            worker_id = %self.worker_id,
                            %registration_id,
                            tickets,
                            reused_tickets,
                            "ticket email sent"
                        );
                    }
                    FulfillmentOutcome::AlreadyDelivered => {
                        tracing::info!(worker_id = %self.worker_id, %registration_id, "ticket email already sent, skipping");
                    }
                }
                Ok(())
            }
            other => Err(JobError::fatal(format!("unknown job type {other}"))),
        }
    }
}
