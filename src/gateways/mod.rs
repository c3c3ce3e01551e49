use crate::error::CallbackError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

pub mod vnpay;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub registration_id: Uuid,
    /// Registration total in minor currency units.
    pub amount: i64,
    pub client_ip: String,
}

/// Provider callback after the signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub order_ref: String,
    /// Amount as the provider expresses it.
    pub provider_amount: i64,
    pub response_code: String,
    pub transaction_ref: Option<String>,
    pub bank_code: Option<String>,
    pub succeeded: bool,
}

pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Label stored on invoices.
    fn payment_method(&self) -> &'static str;

    fn checkout_url(&self, request: &CheckoutRequest, now: DateTime<Utc>) -> Result<String>;

    /// Checksum check over the raw callback parameters. Must run before
    /// anything else looks at the callback.
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool;

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> Result<CallbackPayload, CallbackError>;

    /// Converts a registration total into the provider's amount unit.
    fn provider_amount(&self, total_price: i64) -> i64;
}
