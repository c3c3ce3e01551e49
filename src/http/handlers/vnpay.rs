use crate::service::payment_reconciler::CallbackAck;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use std::collections::BTreeMap;

/// Provider callback. The body is always the two-field ack; only a bad
/// checksum changes the HTTP status.
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let result = state.payment_reconciler.handle_callback(&params).await;
    if let Err(err) = &result {
        tracing::info!(
            order_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or(""),
            "payment callback not applied: {:#}",
            err
        );
    }

    let (status, ack) = CallbackAck::for_result(&result);
    (status, Json(ack)).into_response()
}
