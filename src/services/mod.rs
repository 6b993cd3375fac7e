pub mod analytics;
pub mod mpesa_service;
pub mod payment_flow;
pub mod poller;
pub mod token_cache;
