use crate::domain::account::Account;
use crate::domain::event::Event;
use crate::domain::registration::Registration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PAYMENT_METHOD_VNPAY: &str = "VNPAY";
pub const PAYMENT_METHOD_FREE: &str = "FREE";

/// What the provider (or the free-checkout path) told us about a payment.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub payment_method: String,
    pub transaction_ref: Option<String>,
    pub bank_code: Option<String>,
    pub amount: i64,
}

impl PaymentConfirmation {
    pub fn free() -> Self {
        Self {
            payment_method: PAYMENT_METHOD_FREE.to_string(),
            transaction_ref: None,
            bank_code: None,
            amount: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub account_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub event_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceLine {
    pub ticket_type_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

/// Immutable record of a confirmed payment. Line prices come from the
/// registration, so later edits to a ticket type never leak in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub registration_id: Uuid,
    pub payment_method: String,
    pub transaction_ref: Option<String>,
    pub bank_code: Option<String>,
    pub amount: i64,
    pub customer: CustomerSnapshot,
    pub event: EventSnapshot,
    pub items: Vec<InvoiceLine>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn snapshot(
        registration: &Registration,
        event: &Event,
        account: &Account,
        payment: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> Self {
        let items = registration
            .items
            .iter()
            .map(|i| InvoiceLine {
                ticket_type_id: i.ticket_type_id,
                name: i.ticket_type_name.clone(),
                unit_price: i.unit_price,
                quantity: i.quantity,
                subtotal: i.unit_price * i64::from(i.quantity),
            })
            .collect();

        Self {
            invoice_id: Uuid::new_v4(),
            registration_id: registration.registration_id,
            payment_method: payment.payment_method.clone(),
            transaction_ref: payment.transaction_ref.clone(),
            bank_code: payment.bank_code.clone(),
            amount: registration.total_price,
            customer: CustomerSnapshot {
                account_id: account.account_id,
                full_name: account.full_name.clone(),
                email: account.email.clone(),
                phone: account.phone.clone(),
            },
            event: EventSnapshot {
                event_id: event.event_id,
                name: event.name.clone(),
                location: event.location.clone(),
                starts_at: event.starts_at,
                ends_at: event.ends_at,
            },
            items,
            created_at: now,
        }
    }
}
