use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration closes this long before the event ends.
pub const REGISTRATION_CUTOFF_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_tickets_per_account: Option<i32>,
    pub participant_count: i32,
}

impl Event {
    pub fn registration_deadline(&self) -> DateTime<Utc> {
        self.ends_at - Duration::minutes(REGISTRATION_CUTOFF_MINUTES)
    }

    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        now < self.registration_deadline()
    }
}
