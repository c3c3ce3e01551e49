use anyhow::Result;
use event_ticketing::config::AppConfig;
use event_ticketing::db;
use event_ticketing::metrics::store_redis::FulfillmentMetrics;
use event_ticketing::notify::mailer_from_config;
use event_ticketing::queue::store_redis::JobQueue;
use event_ticketing::repo::accounts_repo::AccountsRepo;
use event_ticketing::repo::events_repo::EventsRepo;
use event_ticketing::repo::registrations_repo::RegistrationsRepo;
use event_ticketing::repo::ticket_types_repo::TicketTypesRepo;
use event_ticketing::repo::tickets_repo::TicketsRepo;
use event_ticketing::service::fulfillment::FulfillmentService;
use event_ticketing::service::fulfillment_worker::FulfillmentWorker;
use event_ticketing::service::retry_policy::RetryPolicy;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let worker_name = std::env::var("WORKER_NAME").unwrap_or_else(|_| "fulfillment-worker".to_string());

    let pool = db::connect(&cfg, (cfg.worker_concurrency as u32 * 2).max(2)).await?;
    let fulfillment = FulfillmentService {
        pool: pool.clone(),
        registrations_repo: RegistrationsRepo { pool: pool.clone() },
        events_repo: EventsRepo { pool: pool.clone() },
        accounts_repo: AccountsRepo { pool: pool.clone() },
        ticket_types_repo: TicketTypesRepo { pool: pool.clone() },
        tickets_repo: TicketsRepo { pool: pool.clone() },
        mailer: mailer_from_config(&cfg.smtp),
    };
    let queue = JobQueue::new(&cfg.redis_url, &cfg.job_queue_key)?;
    let metrics = FulfillmentMetrics::new(&cfg.redis_url, &cfg.outcome_stats_key)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::with_capacity(cfg.worker_concurrency);
    for i in 0..cfg.worker_concurrency {
        let worker = FulfillmentWorker {
            worker_id: format!("{worker_name}-{i}"),
            queue: queue.clone(),
            fulfillment: fulfillment.clone(),
            policy: RetryPolicy::new(cfg.max_job_retries),
            metrics: metrics.clone(),
            pop_timeout_secs: cfg.queue_pop_timeout_secs,
        };
        handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, finishing in-flight jobs");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("worker task failed: {}", e);
        }
    }
    Ok(())
}
