pub mod config;
pub mod db;
pub mod domain {
    pub mod account;
    pub mod event;
    pub mod invoice;
    pub mod job;
    pub mod registration;
    pub mod ticket;
    pub mod ticket_type;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod registrations;
        pub mod vnpay;
    }
    pub mod middleware {
        pub mod account_context;
        pub mod rate_limit;
    }
}
pub mod metrics {
    pub mod store_redis;
}
pub mod notify;
pub mod queue {
    pub mod store_redis;
}
pub mod repo {
    pub mod accounts_repo;
    pub mod events_repo;
    pub mod invoices_repo;
    pub mod registrations_repo;
    pub mod ticket_types_repo;
    pub mod tickets_repo;
}
pub mod reservation {
    pub mod rules;
}
pub mod service {
    pub mod expiration_reaper;
    pub mod fulfillment;
    pub mod fulfillment_sweep;
    pub mod fulfillment_worker;
    pub mod payment_reconciler;
    pub mod reservation_service;
    pub mod retry_policy;
}

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub reservation_service: service::reservation_service::ReservationService,
    pub payment_reconciler: service::payment_reconciler::PaymentReconciler,
    pub job_queue: queue::store_redis::JobQueue,
    pub metrics: metrics::store_redis::FulfillmentMetrics,
    pub redis_client: redis::Client,
}
