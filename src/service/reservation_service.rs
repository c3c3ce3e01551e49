use crate::domain::invoice::PaymentConfirmation;
use crate::domain::registration::{LineItem, Registration, RegistrationResponse, RegistrationStatus};
use crate::error::ReservationError;
use crate::gateways::{CheckoutRequest, PaymentProvider};
use crate::repo::accounts_repo::AccountsRepo;
use crate::repo::events_repo::EventsRepo;
use crate::repo::registrations_repo::RegistrationsRepo;
use crate::repo::ticket_types_repo::TicketTypesRepo;
use crate::reservation::rules::{self, AccountHistory, Shortfall};
use crate::service::payment_reconciler::PaymentReconciler;
use anyhow::anyhow;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReservationService {
    pub pool: PgPool,
    pub events_repo: EventsRepo,
    pub accounts_repo: AccountsRepo,
    pub ticket_types_repo: TicketTypesRepo,
    pub reconciler: PaymentReconciler,
    pub provider: Arc<dyn PaymentProvider>,
}

impl ReservationService {
    /// All-or-nothing: either every line is reserved and a pending
    /// registration exists, or nothing was written.
    pub async fn reserve(
        &self,
        event_id: Uuid,
        account_id: Uuid,
        items: Vec<LineItem>,
        client_ip: &str,
    ) -> Result<RegistrationResponse, ReservationError> {
        let items = rules::normalize(&items).map_err(ReservationError::Validation)?;

        let event = self
            .events_repo
            .get(event_id)
            .await?
            .ok_or(ReservationError::EventNotFound)?;
        let account = self
            .accounts_repo
            .get(account_id)
            .await?
            .ok_or(ReservationError::AccountNotFound)?;

        let requested: Vec<Uuid> = items.iter().map(|i| i.ticket_type_id).collect();
        let ticket_types = self.ticket_types_repo.list_for_event(event_id, &requested).await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        RegistrationsRepo::lock_account_event_tx(&mut tx, account_id, event_id).await?;
        let held = RegistrationsRepo::active_for_account_tx(&mut tx, account_id, event_id).await?;
        let history = AccountHistory::from_registrations(&held);

        let reasons = rules::check(&event, &ticket_types, &items, &history, now);
        if !reasons.is_empty() {
            tx.rollback().await?;
            tracing::info!(%event_id, %account_id, ?reasons, "registration rejected");
            return Err(ReservationError::BusinessRule(reasons));
        }

        // Fixed lock order across concurrent reservations.
        let mut ordered = items.clone();
        ordered.sort_by_key(|i| i.ticket_type_id);

        let mut exhausted = Vec::new();
        let mut off_sale = Vec::new();
        for item in &ordered {
            let reserved =
                TicketTypesRepo::reserve_tx(&mut tx, event_id, item.ticket_type_id, item.quantity).await?;
            if !reserved {
                let current = TicketTypesRepo::get_tx(&mut tx, item.ticket_type_id).await?;
                match rules::shortfall(item.ticket_type_id, current.as_ref(), item.quantity) {
                    Shortfall::SoldOut(reason) => exhausted.push(reason),
                    Shortfall::NotOnSale(reason) => off_sale.push(reason),
                }
            }
        }
        if !exhausted.is_empty() || !off_sale.is_empty() {
            tx.rollback().await?;
            tracing::info!(%event_id, %account_id, ?exhausted, ?off_sale, "registration rejected at reservation");
            if exhausted.is_empty() {
                return Err(ReservationError::BusinessRule(off_sale));
            }
            exhausted.extend(off_sale);
            return Err(ReservationError::StockExhausted(exhausted));
        }

        let priced = rules::price_items(&ticket_types, &items);
        let Some(mut registration) = Registration::new_pending(event_id, account_id, priced, now) else {
            tx.rollback().await?;
            return Err(ReservationError::Validation(vec!["registration total is too large".to_string()]));
        };
        EventsRepo::adjust_participants_tx(&mut tx, event_id, registration.total_quantity).await?;
        RegistrationsRepo::insert_tx(&mut tx, &registration).await?;

        if registration.is_free() {
            let invoice = PaymentReconciler::confirm_tx(
                &mut tx,
                &registration,
                &event,
                &account,
                &PaymentConfirmation::free(),
                now,
            )
            .await?
            .ok_or_else(|| anyhow!("fresh registration {} was not pending", registration.registration_id))?;
            tx.commit().await?;

            registration.status = RegistrationStatus::Paid;
            registration.paid_at = Some(now);
            registration.invoice_id = Some(invoice.invoice_id);
            tracing::info!(
                registration_id = %registration.registration_id,
                %event_id,
                %account_id,
                total_quantity = registration.total_quantity,
                "free registration confirmed"
            );
            self.reconciler.enqueue_fulfillment(registration.registration_id).await;

            return Ok(RegistrationResponse {
                registration,
                payment_url: None,
            });
        }

        tx.commit().await?;
        tracing::info!(
            registration_id = %registration.registration_id,
            %event_id,
            %account_id,
            total_quantity = registration.total_quantity,
            total_price = registration.total_price,
            "registration reserved"
        );

        let payment_url = self.provider.checkout_url(
            &CheckoutRequest {
                registration_id: registration.registration_id,
                amount: registration.total_price,
                client_ip: client_ip.to_string(),
            },
            now,
        )?;

        Ok(RegistrationResponse {
            registration,
            payment_url: Some(payment_url),
        })
    }
}
