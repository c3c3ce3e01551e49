use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use event_ticketing::config::AppConfig;
use event_ticketing::gateways::vnpay::VnpayGateway;
use event_ticketing::gateways::PaymentProvider;
use event_ticketing::http::handlers::{ops, registrations, vnpay};
use event_ticketing::http::middleware::account_context::require_account;
use event_ticketing::http::middleware::rate_limit::{self, RateLimitState};
use event_ticketing::metrics::store_redis::FulfillmentMetrics;
use event_ticketing::queue::store_redis::JobQueue;
use event_ticketing::repo::accounts_repo::AccountsRepo;
use event_ticketing::repo::events_repo::EventsRepo;
use event_ticketing::repo::registrations_repo::RegistrationsRepo;
use event_ticketing::repo::ticket_types_repo::TicketTypesRepo;
use event_ticketing::service::payment_reconciler::PaymentReconciler;
use event_ticketing::service::reservation_service::ReservationService;
use event_ticketing::{db, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = db::connect(&cfg, 20).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;
    let job_queue = JobQueue::new(&cfg.redis_url, &cfg.job_queue_key)?;
    let metrics = FulfillmentMetrics::new(&cfg.redis_url, &cfg.outcome_stats_key)?;

    let provider: Arc<dyn PaymentProvider> = Arc::new(VnpayGateway::new(
        &cfg.vnpay,
        chrono::Duration::minutes(cfg.registration_expiration_minutes),
    ));

    let events_repo = EventsRepo { pool: pool.clone() };
    let accounts_repo = AccountsRepo { pool: pool.clone() };
    let registrations_repo = RegistrationsRepo { pool: pool.clone() };
    let ticket_types_repo = TicketTypesRepo { pool: pool.clone() };

    let payment_reconciler = PaymentReconciler {
        pool: pool.clone(),
        registrations_repo,
        events_repo: events_repo.clone(),
        accounts_repo: accounts_repo.clone(),
        job_queue: job_queue.clone(),
        provider: provider.clone(),
    };
    let reservation_service = ReservationService {
        pool: pool.clone(),
        events_repo,
        accounts_repo,
        ticket_types_repo,
        reconciler: payment_reconciler.clone(),
        provider,
    };

    let state = AppState {
        pool: pool.clone(),
        reservation_service,
        payment_reconciler,
        job_queue,
        metrics,
        redis_client: redis_client.clone(),
    };

    // Layers run bottom-up: identity first, then the per-account limit.
    let account_routes = Router::new()
        .route("/events/:event_id/registration", post(registrations::create_registration))
        .layer(from_fn_with_state(
            RateLimitState {
                redis_client,
                max_per_minute: cfg.reservation_rate_limit_per_minute,
            },
            rate_limit::enforce,
        ))
        .layer(from_fn(require_account));

    let app = Router::new()
        .route("/health", get(ops::health))
        .route("/vnpay_return", get(vnpay::vnpay_return))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .route("/ops/fulfillment-stats", get(ops::fulfillment_stats))
        .merge(account_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
