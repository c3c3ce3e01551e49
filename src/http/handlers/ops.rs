use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    let redis_ok = async {
        if let Ok(mut conn) = state.redis_client.get_multiplexed_async_connection().await {
            let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            return pong.is_ok();
        }
        false
    }
    .await;

    let ok = db_ok && redis_ok;
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ok,
            "db": db_ok,
            "redis": redis_ok
        })),
    )
        .into_response()
}

pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"alive": true}))).into_response()
}

/// Worker outcome counters plus current queue depth.
pub async fn fulfillment_stats(State(state): State<AppState>) -> impl IntoResponse {
    let counts = match state.metrics.read().await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!("failed to read fulfillment stats: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "stats unavailable"})),
            )
                .into_response();
        }
    };
    let queue_depth = state.job_queue.depth().await.ok();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "outcomes": counts,
            "queue_key": state.job_queue.key,
            "queue_depth": queue_depth
        })),
    )
        .into_response()
}
