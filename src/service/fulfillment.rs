use crate::domain::registration::{Registration, RegistrationStatus};
use crate::domain::ticket::{self, Ticket, TicketStatus};
use crate::error::JobError;
use crate::notify::{ticket_email, Mailer};
use crate::repo::accounts_repo::AccountsRepo;
use crate::repo::events_repo::EventsRepo;
use crate::repo::registrations_repo::RegistrationsRepo;
use crate::repo::ticket_types_repo::TicketTypesRepo;
use crate::repo::tickets_repo::TicketsRepo;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Delivered { tickets: usize, reused_tickets: bool },
    AlreadyDelivered,
}

/// Issues tickets for a paid registration and mails them. Every step is
/// safe to repeat: tickets are issued once per registration and a sent
/// email is recorded on the registration.
#[derive(Clone)]
pub struct FulfillmentService {
    pub pool: PgPool,
    pub registrations_repo: RegistrationsRepo,
    pub events_repo: EventsRepo,
    pub accounts_repo: AccountsRepo,
    pub ticket_types_repo: TicketTypesRepo,
    pub tickets_repo: TicketsRepo,
    pub mailer: Arc<dyn Mailer>,
}

impl FulfillmentService {
    pub async fn fulfill(&self, registration_id: Uuid) -> Result<FulfillmentOutcome, JobError> {
        let registration = self
            .registrations_repo
            .get(registration_id)
            .await?
            .ok_or_else(|| JobError::fatal(format!("registration {registration_id} not found")))?;

        if registration.status != RegistrationStatus::Paid {
            return Err(JobError::fatal(format!(
                "registration {registration_id} is {}, expected paid",
                registration.status.as_str()
            )));
        }
        if registration.email_sent_at.is_some() {
            return Ok(FulfillmentOutcome::AlreadyDelivered);
        }

        let event = self
            .events_repo
            .get(registration.event_id)
            .await?
            .ok_or_else(|| JobError::fatal(format!("event {} not found", registration.event_id)))?;
        let account = self
            .accounts_repo
            .get(registration.account_id)
            .await?
            .ok_or_else(|| JobError::fatal(format!("account {} not found", registration.account_id)))?;

        let type_ids: Vec<Uuid> = registration.items.iter().map(|i| i.ticket_type_id).collect();
        let ticket_types = self.ticket_types_repo.list_by_ids(&type_ids).await?;
        if let Some(missing) = type_ids
            .iter()
            .find(|id| !ticket_types.iter().any(|t| t.ticket_type_id == **id))
        {
            return Err(JobError::fatal(format!("ticket type {missing} not found")));
        }

        let (tickets, reused_tickets) = self.issue_tickets(&registration).await?;
        if tickets.len() != registration.total_quantity.max(0) as usize {
            return Err(JobError::fatal(format!(
                "registration {registration_id} has {} tickets, expected {}",
                tickets.len(),
                registration.total_quantity
            )));
        }

        let email = ticket_email::render(&event, &account, &registration, &tickets, &ticket_types)
            .map_err(|e| JobError::fatal(format!("ticket email could not be rendered: {e}")))?;
        self.mailer.send(email).await.map_err(JobError::Transient)?;

        if !self.registrations_repo.mark_email_sent(registration_id, Utc::now()).await? {
            tracing::debug!(%registration_id, "email_sent_at already set by a concurrent delivery");
        }

        Ok(FulfillmentOutcome::Delivered {
            tickets: tickets.len(),
            reused_tickets,
        })
    }

    /// Returns the registration's confirmed tickets, creating them on the
    /// first run. Concurrent runs serialize on the registration row.
    async fn issue_tickets(&self, registration: &Registration) -> Result<(Vec<Ticket>, bool), JobError> {
        let registration_id = registration.registration_id;
        let existing = self
            .tickets_repo
            .list_by_registration(registration_id, TicketStatus::Confirmed)
            .await?;
        if !existing.is_empty() {
            return Ok((existing, true));
        }

        let mut tx = self.pool.begin().await?;
        let locked = RegistrationsRepo::get_for_update_tx(&mut tx, registration_id)
            .await?
            .ok_or_else(|| JobError::fatal(format!("registration {registration_id} not found")))?;

        let existing =
            TicketsRepo::list_by_registration_tx(&mut tx, registration_id, TicketStatus::Confirmed).await?;
        if !existing.is_empty() {
            tx.rollback().await?;
            return Ok((existing, true));
        }

        let tickets = ticket::issue_for(&locked, Utc::now());
        TicketsRepo::insert_many_tx(&mut tx, &tickets).await?;
        tx.commit().await?;

        tracing::info!(%registration_id, tickets = tickets.len(), "tickets issued");
        Ok((tickets, false))
    }
}
