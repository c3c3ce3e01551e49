use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Paid,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One requested line of a registration, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}

/// A reserved line, priced at reservation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationItem {
    pub ticket_type_id: Uuid,
    pub ticket_type_name: String,
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub account_id: Uuid,
    pub items: Vec<RegistrationItem>,
    pub total_quantity: i32,
    pub total_price: i64,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub invoice_id: Option<Uuid>,
    pub transaction_ref: Option<String>,
}

impl Registration {
    /// None when the totals overflow.
    pub fn new_pending(
        event_id: Uuid,
        account_id: Uuid,
        items: Vec<RegistrationItem>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let total_quantity = items.iter().try_fold(0i32, |acc, i| acc.checked_add(i.quantity))?;
        let total_price = items.iter().try_fold(0i64, |acc, i| {
            i.unit_price.checked_mul(i64::from(i.quantity)).and_then(|line| acc.checked_add(line))
        })?;
        Some(Self {
            registration_id: Uuid::new_v4(),
            event_id,
            account_id,
            items,
            total_quantity,
            total_price,
            status: RegistrationStatus::Pending,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
            email_sent_at: None,
            invoice_id: None,
            transaction_ref: None,
        })
    }

    pub fn is_free(&self) -> bool {
        self.total_price == 0
    }
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub registration: Registration,
    /// Absent for free registrations, which are confirmed without a provider round trip.
    pub payment_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_the_priced_items() {
        let items = vec![
            RegistrationItem {
                ticket_type_id: Uuid::new_v4(),
                ticket_type_name: "VIP".to_string(),
                unit_price: 250_000,
                quantity: 2,
            },
            RegistrationItem {
                ticket_type_id: Uuid::new_v4(),
                ticket_type_name: "Standard".to_string(),
                unit_price: 100_000,
                quantity: 1,
            },
        ];
        let reg = Registration::new_pending(Uuid::new_v4(), Uuid::new_v4(), items, Utc::now()).unwrap();
        assert_eq!(reg.total_quantity, 3);
        assert_eq!(reg.total_price, 600_000);
        assert_eq!(reg.status, RegistrationStatus::Pending);
        assert!(!reg.is_free());
    }

    #[test]
    fn overflowing_totals_are_refused() {
        let line = |quantity| RegistrationItem {
            ticket_type_id: Uuid::new_v4(),
            ticket_type_name: "Standard".to_string(),
            unit_price: 1,
            quantity,
        };
        let items = vec![line(1_500_000_000), line(1_500_000_000)];
        assert!(Registration::new_pending(Uuid::new_v4(), Uuid::new_v4(), items, Utc::now()).is_none());
    }
}
