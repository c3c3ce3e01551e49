use crate::error::envelope;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// Authenticated caller, resolved by the upstream auth layer and handed
/// over in `X-Account-Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerAccount(pub Uuid);

pub fn parse_account_header(value: Option<&str>) -> Option<Uuid> {
    value.and_then(|v| Uuid::parse_str(v.trim()).ok())
}

pub async fn require_account(mut request: Request<Body>, next: Next) -> Response {
    let account = parse_account_header(
        request
            .headers()
            .get(ACCOUNT_HEADER)
            .and_then(|h| h.to_str().ok()),
    );

    let Some(account_id) = account else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(envelope("UNAUTHENTICATED", "missing or invalid X-Account-Id", Vec::new())),
        )
            .into_response();
    };

    request.extensions_mut().insert(CallerAccount(account_id));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_must_be_a_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_account_header(Some(&id.to_string())), Some(id));
        assert_eq!(parse_account_header(Some(" not-a-uuid ")), None);
        assert_eq!(parse_account_header(None), None);
    }
}
