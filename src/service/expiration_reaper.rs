use crate::repo::events_repo::EventsRepo;
use crate::repo::registrations_repo::RegistrationsRepo;
use crate::repo::ticket_types_repo::TicketTypesRepo;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapReport {
    pub scanned: usize,
    pub cancelled: usize,
    /// Left pending between listing and cancelling, e.g. paid meanwhile.
    pub skipped: usize,
    pub failed: usize,
}

/// Pending registrations created before this instant are expired.
pub fn expiration_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now - window
}

#[derive(Clone)]
pub struct ExpirationReaper {
    pub pool: PgPool,
    pub registrations_repo: RegistrationsRepo,
    pub window: Duration,
    pub batch_size: i64,
}

impl ExpirationReaper {
    pub async fn run(self, interval: std::time::Duration) {
        loop {
            match self.tick().await {
                Ok(report) if report.scanned > 0 => {
                    tracing::info!(
                        scanned = report.scanned,
                        cancelled = report.cancelled,
                        skipped = report.skipped,
                        failed = report.failed,
                        "expiration pass finished"
                    );
                }
                Ok(_) => {}
                Err(err) => tracing::error!("expiration reaper error: {}", err),
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn tick(&self) -> Result<ReapReport> {
        let cutoff = expiration_cutoff(Utc::now(), self.window);
        let expired = self.registrations_repo.list_expired(cutoff, self.batch_size).await?;

        let mut report = ReapReport {
            scanned: expired.len(),
            ..ReapReport::default()
        };
        for registration_id in expired {
            match self.cancel_one(registration_id).await {
                Ok(true) => report.cancelled += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(%registration_id, "failed to expire registration: {}", e);
                }
            }
        }
        Ok(report)
    }

    /// Cancels one registration and gives its stock back, atomically.
    /// False when it was no longer pending.
    pub async fn cancel_one(&self, registration_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(registration) = RegistrationsRepo::cancel_tx(&mut tx, registration_id, Utc::now()).await? else {
            tx.rollback().await?;
            tracing::debug!(%registration_id, "registration no longer pending, skipped");
            return Ok(false);
        };

        let mut items = registration.items.clone();
        items.sort_by_key(|i| i.ticket_type_id);
        for item in &items {
            if !TicketTypesRepo::release_tx(&mut tx, item.ticket_type_id, item.quantity).await? {
                tracing::warn!(
                    %registration_id,
                    ticket_type_id = %item.ticket_type_id,
                    quantity = item.quantity,
                    "registered count lower than released quantity"
                );
            }
        }
        EventsRepo::adjust_participants_tx(&mut tx, registration.event_id, -registration.total_quantity).await?;
        tx.commit().await?;

        tracing::info!(
            %registration_id,
            event_id = %registration.event_id,
            released = registration.total_quantity,
            "pending registration expired"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_is_window_before_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let cutoff = expiration_cutoff(now, Duration::minutes(15));
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 3, 1, 11, 45, 0).unwrap());
    }

    #[test]
    fn registration_exactly_at_window_is_not_yet_expired() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 11, 45, 0).unwrap();
        // list_expired selects created_at < cutoff
        assert!(created_at >= expiration_cutoff(now, Duration::minutes(15)));
    }
}
