use crate::domain::registration::Registration;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// No 0/O or 1/I: codes get read aloud at the door.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Confirmed,
    CheckedIn,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked_in",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "checked_in" => Self::CheckedIn,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            _ => Self::Confirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub registration_id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

pub fn redemption_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// One confirmed ticket per purchased unit, each with a fresh code.
pub fn issue_for(registration: &Registration, now: DateTime<Utc>) -> Vec<Ticket> {
    let mut rng = rand::thread_rng();
    registration
        .items
        .iter()
        .flat_map(|item| std::iter::repeat(item.ticket_type_id).take(item.quantity.max(0) as usize))
        .map(|ticket_type_id| Ticket {
            ticket_id: Uuid::new_v4(),
            event_id: registration.event_id,
            ticket_type_id,
            registration_id: registration.registration_id,
            account_id: registration.account_id,
            code: redemption_code(&mut rng),
            status: TicketStatus::Confirmed,
            created_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registration::RegistrationItem;
    use std::collections::HashSet;

    #[test]
    fn one_ticket_per_unit_with_distinct_codes() {
        let vip = Uuid::new_v4();
        let standard = Uuid::new_v4();
        let reg = Registration::new_pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![
                RegistrationItem {
                    ticket_type_id: vip,
                    ticket_type_name: "VIP".to_string(),
                    unit_price: 10,
                    quantity: 2,
                },
                RegistrationItem {
                    ticket_type_id: standard,
                    ticket_type_name: "Standard".to_string(),
                    unit_price: 5,
                    quantity: 3,
                },
            ],
            Utc::now(),
        )
        .unwrap();

        let tickets = issue_for(&reg, Utc::now());
        assert_eq!(tickets.len(), 5);
        assert_eq!(tickets.iter().filter(|t| t.ticket_type_id == vip).count(), 2);
        let codes: HashSet<_> = tickets.iter().map(|t| t.code.clone()).collect();
        assert_eq!(codes.len(), 5);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Confirmed));
    }

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        let code = redemption_code(&mut rand::thread_rng());
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }
}
