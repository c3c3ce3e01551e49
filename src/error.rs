use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

pub fn envelope(code: &str, message: &str, reasons: Vec<String>) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: message.to_string(),
            reasons,
        },
    }
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("invalid registration request")]
    Validation(Vec<String>),
    #[error("registration rejected by business rules")]
    BusinessRule(Vec<String>),
    #[error("ticket stock exhausted")]
    StockExhausted(Vec<String>),
    #[error("event not found")]
    EventNotFound,
    #[error("account not found")]
    AccountNotFound,
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infrastructure(e.into())
    }
}

impl ReservationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BusinessRule(_) | Self::StockExhausted(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound => StatusCode::NOT_FOUND,
            Self::AccountNotFound => StatusCode::UNAUTHORIZED,
            Self::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Validation(reasons) => envelope("INVALID_REQUEST", &self.to_string(), reasons.clone()),
            Self::BusinessRule(reasons) => envelope("REGISTRATION_REJECTED", &self.to_string(), reasons.clone()),
            Self::StockExhausted(reasons) => envelope("STOCK_EXHAUSTED", &self.to_string(), reasons.clone()),
            Self::EventNotFound => envelope("EVENT_NOT_FOUND", &self.to_string(), Vec::new()),
            Self::AccountNotFound => envelope("UNKNOWN_ACCOUNT", &self.to_string(), Vec::new()),
            // Internals stay in the logs.
            Self::Infrastructure(_) => envelope("INTERNAL_ERROR", "internal error", Vec::new()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("payment callback signature mismatch")]
    InvalidSignature,
    #[error("malformed payment callback: {0}")]
    Malformed(String),
    #[error("no pending registration for order {0}")]
    UnmatchedOrder(String),
    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: i64 },
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl From<sqlx::Error> for CallbackError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infrastructure(e.into())
    }
}

/// Failure taxonomy of the fulfillment worker. Fatal jobs are dropped,
/// transient ones go back to the queue while retries remain.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("transient: {0}")]
    Transient(#[source] anyhow::Error),
}

impl JobError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<anyhow::Error> for JobError {
    fn from(e: anyhow::Error) -> Self {
        classify(e)
    }
}

impl From<sqlx::Error> for JobError {
    fn from(e: sqlx::Error) -> Self {
        classify(e.into())
    }
}

/// Data-shape problems cannot heal on retry; everything else (pool
/// timeouts, statement timeouts, I/O, redis, smtp) is treated as transient.
pub fn classify(e: anyhow::Error) -> JobError {
    if let Some(db) = e.downcast_ref::<sqlx::Error>() {
        let fatal = matches!(
            db,
            sqlx::Error::RowNotFound
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. }
        );
        if fatal {
            return JobError::Fatal(e.to_string());
        }
        return JobError::Transient(e);
    }

    if e.downcast_ref::<serde_json::Error>().is_some() {
        return JobError::Fatal(e.to_string());
    }

    JobError::Transient(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        let err = classify(anyhow::Error::new(sqlx::Error::PoolTimedOut));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_row_is_fatal() {
        let err = classify(anyhow::Error::new(sqlx::Error::RowNotFound));
        assert!(err.is_fatal());
    }

    #[test]
    fn undecodable_payload_is_fatal() {
        let decode = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(classify(decode.into()).is_fatal());
    }

    #[test]
    fn infrastructure_detail_is_not_leaked() {
        let err = ReservationError::Infrastructure(anyhow::anyhow!("password=hunter2"));
        let body = serde_json::to_string(&err.to_envelope()).unwrap();
        assert!(!body.contains("hunter2"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
