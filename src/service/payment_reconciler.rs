use crate::domain::account::Account;
use crate::domain::event::Event;
use crate::domain::invoice::{Invoice, PaymentConfirmation};
use crate::domain::job::FulfillmentJob;
use crate::domain::registration::{Registration, RegistrationStatus};
use crate::error::CallbackError;
use crate::gateways::PaymentProvider;
use crate::queue::store_redis::JobQueue;
use crate::repo::accounts_repo::AccountsRepo;
use crate::repo::events_repo::EventsRepo;
use crate::repo::invoices_repo::InvoicesRepo;
use crate::repo::registrations_repo::RegistrationsRepo;
use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Confirmed,
    AlreadyPaid,
    ProviderDeclined,
}

/// Fixed two-field body the provider expects back.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallbackAck {
    pub code: &'static str,
    pub message: &'static str,
}

impl CallbackAck {
    pub const CONFIRMED: Self = Self { code: "00", message: "Confirm Success" };
    pub const ORDER_NOT_FOUND: Self = Self { code: "01", message: "Order not found" };
    pub const INVALID_AMOUNT: Self = Self { code: "04", message: "Invalid amount" };
    pub const INVALID_SIGNATURE: Self = Self { code: "97", message: "Invalid signature" };
    pub const UNKNOWN_ERROR: Self = Self { code: "99", message: "Unknown error" };

    /// Everything past the signature check answers 200; only the
    /// signature failure is rejected outright.
    pub fn for_result(result: &Result<CallbackOutcome, CallbackError>) -> (StatusCode, Self) {
        match result {
            Ok(_) => (StatusCode::OK, Self::CONFIRMED),
            Err(CallbackError::InvalidSignature) => (StatusCode::UNAUTHORIZED, Self::INVALID_SIGNATURE),
            Err(CallbackError::UnmatchedOrder(_)) => (StatusCode::OK, Self::ORDER_NOT_FOUND),
            Err(CallbackError::AmountMismatch { .. }) => (StatusCode::OK, Self::INVALID_AMOUNT),
            Err(CallbackError::Malformed(_)) | Err(CallbackError::Infrastructure(_)) => {
                (StatusCode::OK, Self::UNKNOWN_ERROR)
            }
        }
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    pub pool: PgPool,
    pub registrations_repo: RegistrationsRepo,
    pub events_repo: EventsRepo,
    pub accounts_repo: AccountsRepo,
    pub job_queue: JobQueue,
    pub provider: Arc<dyn PaymentProvider>,
}

impl PaymentReconciler {
    /// Safe to call any number of times for the same provider transaction:
    /// only the first successful call writes an invoice and enqueues a job.
    pub async fn handle_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<CallbackOutcome, CallbackError> {
        if !self.provider.verify_callback(params) {
            tracing::warn!(
                provider = self.provider.name(),
                order_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or(""),
                "payment callback rejected: checksum mismatch"
            );
            return Err(CallbackError::InvalidSignature);
        }

        let payload = self.provider.parse_callback(params)?;
        if !payload.succeeded {
            tracing::info!(
                order_ref = %payload.order_ref,
                response_code = %payload.response_code,
                "provider reported failed payment, registration left pending"
            );
            return Ok(CallbackOutcome::ProviderDeclined);
        }

        let registration_id = Uuid::parse_str(&payload.order_ref)
            .map_err(|_| CallbackError::UnmatchedOrder(payload.order_ref.clone()))?;
        let registration = self
            .registrations_repo
            .get(registration_id)
            .await?
            .ok_or_else(|| CallbackError::UnmatchedOrder(payload.order_ref.clone()))?;

        match registration.status {
            RegistrationStatus::Paid => {
                tracing::info!(%registration_id, "duplicate payment callback, already paid");
                return Ok(CallbackOutcome::AlreadyPaid);
            }
            RegistrationStatus::Cancelled => {
                tracing::error!(
                    %registration_id,
                    transaction_ref = payload.transaction_ref.as_deref().unwrap_or(""),
                    "payment arrived for a cancelled registration, needs manual refund"
                );
                return Err(CallbackError::UnmatchedOrder(payload.order_ref));
            }
            RegistrationStatus::Pending => {}
        }

        let expected = self.provider.provider_amount(registration.total_price);
        if payload.provider_amount != expected {
            tracing::warn!(
                %registration_id,
                expected,
                received = payload.provider_amount,
                "payment callback rejected: amount mismatch"
            );
            return Err(CallbackError::AmountMismatch {
                expected,
                received: payload.provider_amount,
            });
        }

        let (event, account) = self.load_parties(&registration).await?;
        let confirmation = PaymentConfirmation {
            payment_method: self.provider.payment_method().to_string(),
            transaction_ref: payload.transaction_ref.clone(),
            bank_code: payload.bank_code.clone(),
            amount: registration.total_price,
        };

        let mut tx = self.pool.begin().await?;
        let invoice = Self::confirm_tx(&mut tx, &registration, &event, &account, &confirmation, Utc::now()).await?;
        let Some(invoice) = invoice else {
            tx.rollback().await?;
            // Lost a race: either a concurrent callback or the reaper.
            return match self.registrations_repo.get(registration_id).await?.map(|r| r.status) {
                Some(RegistrationStatus::Paid) => Ok(CallbackOutcome::AlreadyPaid),
                _ => {
                    tracing::error!(%registration_id, "registration expired while payment was confirmed, needs manual refund");
                    Err(CallbackError::UnmatchedOrder(payload.order_ref))
                }
            };
        };
        tx.commit().await?;

        tracing::info!(
            %registration_id,
            invoice_id = %invoice.invoice_id,
            transaction_ref = invoice.transaction_ref.as_deref().unwrap_or(""),
            "registration paid"
        );
        self.enqueue_fulfillment(registration_id).await;
        Ok(CallbackOutcome::Confirmed)
    }

    /// pending -> paid plus the invoice snapshot, inside the caller's
    /// transaction. `None` means the registration was no longer pending.
    pub async fn confirm_tx(
        tx: &mut Transaction<'_, Postgres>,
        registration: &Registration,
        event: &Event,
        account: &Account,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Invoice>> {
        let invoice = Invoice::snapshot(registration, event, account, confirmation, now);
        let transitioned = RegistrationsRepo::mark_paid_tx(
            tx,
            registration.registration_id,
            invoice.invoice_id,
            confirmation.transaction_ref.as_deref(),
            now,
        )
        .await?;
        if !transitioned {
            return Ok(None);
        }

        if !InvoicesRepo::insert_tx(tx, &invoice).await? {
            anyhow::bail!(
                "invoice already exists for pending registration {}",
                registration.registration_id
            );
        }
        Ok(Some(invoice))
    }

    /// Runs after commit. A failed push is logged and left to the
    /// fulfillment sweep; the payment itself stands.
    pub async fn enqueue_fulfillment(&self, registration_id: Uuid) {
        match self.job_queue.push(&FulfillmentJob::ticket_email(registration_id)).await {
            Ok(()) => {
                if let Err(e) = self.registrations_repo.mark_enqueued(registration_id).await {
                    tracing::warn!(%registration_id, "failed to stamp enqueue time: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(%registration_id, "failed to enqueue fulfillment job: {}", e);
            }
        }
    }

    async fn load_parties(&self, registration: &Registration) -> Result<(Event, Account), CallbackError> {
        let event = self
            .events_repo
            .get(registration.event_id)
            .await?
            .ok_or_else(|| anyhow!("event {} missing for registration", registration.event_id))?;
        let account = self
            .accounts_repo
            .get(registration.account_id)
            .await?
            .ok_or_else(|| anyhow!("account {} missing for registration", registration.account_id))?;
        Ok((event, account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_outcomes_always_answer_200() {
        let cases: Vec<Result<CallbackOutcome, CallbackError>> = vec![
            Ok(CallbackOutcome::Confirmed),
            Ok(CallbackOutcome::AlreadyPaid),
            Ok(CallbackOutcome::ProviderDeclined),
            Err(CallbackError::UnmatchedOrder("x".to_string())),
            Err(CallbackError::AmountMismatch { expected: 1, received: 2 }),
            Err(CallbackError::Infrastructure(anyhow!("db down"))),
        ];
        for case in &cases {
            assert_eq!(CallbackAck::for_result(case).0, StatusCode::OK);
        }
    }

    #[test]
    fn duplicate_callback_gets_the_same_ack_as_the_first() {
        let first = CallbackAck::for_result(&Ok(CallbackOutcome::Confirmed));
        let second = CallbackAck::for_result(&Ok(CallbackOutcome::AlreadyPaid));
        assert_eq!(first, second);
    }

    #[test]
    fn bad_signature_is_the_only_rejection() {
        let (status, ack) = CallbackAck::for_result(&Err(CallbackError::InvalidSignature));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(ack.code, "97");
    }
}
