use anyhow::Result;
use redis::AsyncCommands;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Requeued,
    DroppedFatal,
    DroppedExhausted,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Requeued => "requeued",
            Self::DroppedFatal => "dropped_fatal",
            Self::DroppedExhausted => "dropped_exhausted",
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct OutcomeCounts {
    pub done: i64,
    pub requeued: i64,
    pub dropped_fatal: i64,
    pub dropped_exhausted: i64,
}

/// Worker outcome counters shared by every worker process. Dropped jobs
/// have no user-facing surface, so this is where they show up.
#[derive(Clone)]
pub struct FulfillmentMetrics {
    pub client: redis::Client,
    pub key: String,
}

impl FulfillmentMetrics {
    pub fn new(redis_url: &str, key: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key: key.to_string(),
        })
    }

    pub async fn record(&self, outcome: JobOutcome) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.hincr(&self.key, outcome.as_str(), 1).await?;
        Ok(())
    }

    pub async fn read(&self) -> Result<OutcomeCounts> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let values: HashMap<String, i64> = conn.hgetall(&self.key).await?;
        let get = |outcome: JobOutcome| values.get(outcome.as_str()).copied().unwrap_or(0);
        Ok(OutcomeCounts {
            done: get(JobOutcome::Done),
            requeued: get(JobOutcome::Requeued),
            dropped_fatal: get(JobOutcome::DroppedFatal),
            dropped_exhausted: get(JobOutcome::DroppedExhausted),
        })
    }
}
