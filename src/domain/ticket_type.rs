use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketTypeStatus {
    Active,
    Inactive,
    Canceled,
}

impl TicketTypeStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "canceled" => Self::Canceled,
            _ => Self::Inactive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub ticket_type_id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    /// Minor currency units; 0 means free.
    pub price: i64,
    /// `None` means unlimited.
    pub capacity: Option<i32>,
    pub registered_count: i32,
    pub status: TicketTypeStatus,
}

impl TicketType {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }

    pub fn remaining(&self) -> Option<i32> {
        self.capacity.map(|c| (c - self.registered_count).max(0))
    }
}
