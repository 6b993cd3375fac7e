use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::payment_handlers;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(payments_health))
        // Payment lifecycle
        .route("/payment", post(payment_handlers::initiate_payment))
        .route("/callback", post(payment_handlers::mpesa_callback))
        .route("/status/:id", get(payment_handlers::get_transaction_status))
        // Payment status check endpoint (POST for frontend)
        .route(
            "/check-payment-status",
            post(payment_handlers::check_payment_status),
        )
        // Provider-side status lookup
        .route(
            "/query/:checkout_request_id",
            get(payment_handlers::query_provider_status),
        )
        // Reporting
        .route("/transactions", get(payment_handlers::get_transactions))
        .route("/analytics", get(payment_handlers::get_analytics))
}

async fn payments_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mpesa",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["stk-push", "callback", "transactions", "analytics", "payment-status-check"]
    }))
}
