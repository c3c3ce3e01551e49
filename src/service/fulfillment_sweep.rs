use crate::domain::job::FulfillmentJob;
use crate::queue::store_redis::JobQueue;
use crate::repo::registrations_repo::RegistrationsRepo;
use anyhow::Result;
use chrono::{Duration, Utc};

/// Re-enqueues ticket emails for paid registrations that never got one,
/// covering a lost push after payment or a job dropped by a dead worker.
/// Each registration is re-enqueued at most `max_enqueues` times in total.
#[derive(Clone)]
pub struct FulfillmentSweep {
    pub registrations_repo: RegistrationsRepo,
    pub job_queue: JobQueue,
    pub grace: Duration,
    pub max_enqueues: i32,
    pub batch_size: i64,
}

impl FulfillmentSweep {
    pub async fn run(self, interval: std::time::Duration) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("fulfillment sweep error: {}", err);
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn tick(&self) -> Result<usize> {
        let stale_before = Utc::now() - self.grace;
        let claimed = self
            .registrations_repo
            .claim_unfulfilled(stale_before, self.max_enqueues, self.batch_size)
            .await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        let mut pushed = 0;
        for registration_id in claimed {
            match self.job_queue.push(&FulfillmentJob::ticket_email(registration_id)).await {
                Ok(()) => pushed += 1,
                // Claim already stamped; the row comes back after another grace period.
                Err(e) => tracing::warn!(%registration_id, "sweep enqueue failed: {}", e),
            }
        }
        tracing::info!(pushed, "fulfillment sweep re-enqueued ticket emails");
        Ok(pushed)
    }
}
