use crate::error::JobError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const JOB_TICKET_EMAIL: &str = "ticket_email";

/// Queue payload. Lives only in the queue; a retry is a re-push with a
/// bumped counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentJob {
    #[serde(rename = "type")]
    pub job_type: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub retry_count: u32,
}

impl FulfillmentJob {
    pub fn ticket_email(registration_id: Uuid) -> Self {
        Self {
            job_type: JOB_TICKET_EMAIL.to_string(),
            data: serde_json::json!({ "registration_id": registration_id }),
            retry_count: 0,
        }
    }

    pub fn registration_id(&self) -> Result<Uuid, JobError> {
        self.data
            .get("registration_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| JobError::fatal("job data has no valid registration_id"))
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, JobError> {
        serde_json::from_str(raw).map_err(|e| JobError::fatal(format!("undecodable job: {e}")))
    }
}
