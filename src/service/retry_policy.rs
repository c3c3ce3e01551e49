use crate::domain::job::FulfillmentJob;
use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Fatal,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Requeue(FulfillmentJob),
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// A job is attempted at most `max_retries + 1` times. The retry
    /// counter itself is bumped by the queue on requeue.
    pub fn decide(&self, job: FulfillmentJob, err: &JobError) -> RetryDecision {
        match err {
            JobError::Fatal(_) => RetryDecision::Drop(DropReason::Fatal),
            JobError::Transient(_) if job.retry_count < self.max_retries => RetryDecision::Requeue(job),
            JobError::Transient(_) => RetryDecision::Drop(DropReason::Exhausted),
        }
    }
}
