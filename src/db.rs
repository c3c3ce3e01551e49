use crate::config::AppConfig;
use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// Every connection carries a server-side `statement_timeout`, so a stuck
/// query comes back as an error instead of holding a worker forever.
pub async fn connect(cfg: &AppConfig, max_connections: u32) -> Result<PgPool> {
    let statement_timeout = cfg.db_statement_timeout_ms.to_string();
    let options = PgConnectOptions::from_str(&cfg.database_url)?
        .options([("statement_timeout", statement_timeout.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_statement_timeout_ms))
        .connect_with(options)
        .await?;

    Ok(pool)
}
