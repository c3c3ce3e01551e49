use event_ticketing::domain::job::FulfillmentJob;
use event_ticketing::error::JobError;
use event_ticketing::service::retry_policy::{DropReason, RetryDecision, RetryPolicy};
use uuid::Uuid;

fn job_with_retries(retry_count: u32) -> FulfillmentJob {
    let mut job = FulfillmentJob::ticket_email(Uuid::new_v4());
    job.retry_count = retry_count;
    job
}

fn transient() -> JobError {
    JobError::Transient(anyhow::anyhow!("smtp connection reset"))
}

#[test]
fn transient_failure_is_requeued_while_retries_remain() {
    let policy = RetryPolicy::new(3);
    let job = job_with_retries(2);
    assert_eq!(policy.decide(job.clone(), &transient()), RetryDecision::Requeue(job));
}

#[test]
fn transient_failure_is_dropped_once_retries_are_spent() {
    let policy = RetryPolicy::new(3);
    assert_eq!(
        policy.decide(job_with_retries(3), &transient()),
        RetryDecision::Drop(DropReason::Exhausted)
    );
}

#[test]
fn fatal_failure_is_never_retried() {
    let policy = RetryPolicy::new(3);
    assert_eq!(
        policy.decide(job_with_retries(0), &JobError::fatal("registration not found")),
        RetryDecision::Drop(DropReason::Fatal)
    );
}

#[test]
fn zero_retries_means_a_single_attempt() {
    let policy = RetryPolicy::new(0);
    assert_eq!(
        policy.decide(job_with_retries(0), &transient()),
        RetryDecision::Drop(DropReason::Exhausted)
    );
}

#[test]
fn pool_timeout_classifies_as_transient() {
    let err: JobError = sqlx::Error::PoolTimedOut.into();
    assert!(!err.is_fatal());
    assert!(matches!(
        RetryPolicy::new(1).decide(job_with_retries(0), &err),
        RetryDecision::Requeue(_)
    ));
}
