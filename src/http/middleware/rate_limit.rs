use crate::error::envelope;
use crate::http::middleware::account_context::CallerAccount;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use uuid::Uuid;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

pub fn window_key(account_id: Uuid, now: DateTime<Utc>) -> String {
    format!("ticketing:rate:{}:{}", account_id, now.format("%Y%m%d%H%M"))
}

/// Fixed one-minute window per account. Runs behind `require_account`;
/// lets the request through when Redis is unreachable.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(CallerAccount(account_id)) = request.extensions().get::<CallerAccount>().copied() else {
        return next.run(request).await;
    };

    let key = window_key(account_id, Utc::now());
    if let Ok(mut conn) = state.redis_client.get_multiplexed_async_connection().await {
        let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
        let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
        if count > state.max_per_minute {
            tracing::warn!(%account_id, count, "registration rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(envelope("RATE_LIMITED", "too many registration attempts, retry in a minute", Vec::new())),
            )
                .into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_changes_every_minute() {
        let id = Uuid::nil();
        let a = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 59).unwrap();
        let c = Utc.with_ymd_and_hms(2026, 5, 1, 9, 31, 0).unwrap();
        assert_eq!(window_key(id, a), window_key(id, b));
        assert_ne!(window_key(id, b), window_key(id, c));
    }
}
