use crate::domain::registration::LineItem;
use crate::error::envelope;
use crate::http::middleware::account_context::CallerAccount;
use crate::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

const FALLBACK_CLIENT_IP: &str = "127.0.0.1";

pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(FALLBACK_CLIENT_IP)
        .to_string()
}

pub async fn create_registration(
    State(state): State<AppState>,
    Extension(CallerAccount(account_id)): Extension<CallerAccount>,
    headers: HeaderMap,
    event_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Vec<LineItem>>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Path(event_id)) = event_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(envelope("INVALID_REQUEST", "event id must be a UUID", Vec::new())),
        )
            .into_response();
    };
    let items = match body {
        Ok(Json(items)) => items,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(envelope(
                    "INVALID_REQUEST",
                    "body must be a JSON array of {ticket_type_id, quantity}",
                    vec![rejection.body_text()],
                )),
            )
                .into_response();
        }
    };

    match state
        .reservation_service
        .reserve(event_id, account_id, items, &client_ip(&headers))
        .await
    {
        Ok(resp) => (StatusCode::CREATED, Json(resp)).into_response(),
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(%event_id, %account_id, "registration failed: {:#}", err);
            }
            (err.status(), Json(err.to_envelope())).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new()), FALLBACK_CLIENT_IP);
    }
}
