use crate::domain::job::FulfillmentJob;
use anyhow::Result;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// FIFO job list in Redis: producers `RPUSH` to the tail, workers `BLPOP`
/// from the head. A job popped by a worker that then dies is lost; the
/// fulfillment sweep re-derives it from registration state.
#[derive(Clone)]
pub struct JobQueue {
    pub client: redis::Client,
    pub key: String,
}

impl JobQueue {
    pub fn new(redis_url: &str, key: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key: key.to_string(),
        })
    }

    pub async fn push(&self, job: &FulfillmentJob) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = job.encode()?;
        let _: usize = conn.rpush(&self.key, payload).await?;
        Ok(())
    }

    /// Back to the tail with the retry counter bumped.
    pub async fn requeue(&self, mut job: FulfillmentJob) -> Result<()> {
        job.retry_count += 1;
        self.push(&job).await
    }

    /// A blocking pop parks the whole connection, so each worker loop
    /// opens its own instead of sharing the multiplexed one.
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Waits up to `timeout_secs` for a job. `None` means the wait elapsed.
    pub async fn pop_blocking(
        &self,
        conn: &mut MultiplexedConnection,
        timeout_secs: f64,
    ) -> Result<Option<String>> {
        let popped: Option<(String, String)> = conn.blpop(&self.key, timeout_secs).await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    pub async fn depth(&self) -> Result<i64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: i64 = conn.llen(&self.key).await?;
        Ok(len)
    }
}
