use anyhow::Result;
use event_ticketing::config::AppConfig;
use event_ticketing::db;
use event_ticketing::queue::store_redis::JobQueue;
use event_ticketing::repo::registrations_repo::RegistrationsRepo;
use event_ticketing::service::expiration_reaper::ExpirationReaper;
use event_ticketing::service::fulfillment_sweep::FulfillmentSweep;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = db::connect(&cfg, 4).await?;
    let registrations_repo = RegistrationsRepo { pool: pool.clone() };
    let interval = Duration::from_secs(cfg.reaper_interval_secs.max(1));

    let reaper = ExpirationReaper {
        pool,
        registrations_repo: registrations_repo.clone(),
        window: chrono::Duration::minutes(cfg.registration_expiration_minutes),
        batch_size: cfg.reaper_batch_size,
    };
    let sweep = FulfillmentSweep {
        registrations_repo,
        job_queue: JobQueue::new(&cfg.redis_url, &cfg.job_queue_key)?,
        grace: chrono::Duration::minutes(cfg.sweep_grace_minutes),
        max_enqueues: cfg.sweep_max_enqueues,
        batch_size: cfg.reaper_batch_size,
    };

    tracing::info!(
        window_minutes = cfg.registration_expiration_minutes,
        interval_secs = interval.as_secs(),
        "expiration reaper started"
    );
    tokio::select! {
        _ = reaper.run(interval) => {}
        _ = sweep.run(interval) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}
