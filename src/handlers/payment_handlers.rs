// handlers/payment_handlers.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::transaction::{normalize_phone_number, CreatePaymentRequest, NewTransaction};
use crate::services::analytics::{aggregate, AnalyticsRange};
use crate::services::payment_flow::{process_callback, CallbackOutcome};
use crate::services::poller::{PollOutcome, StatusPoller, StoreStatusSource};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<AnalyticsRange>,
}

#[derive(Debug, Deserialize)]
pub struct CheckPaymentStatusRequest {
    pub transaction_id: String,
}

/// POST /payment — validates, normalizes the phone number, sends the
/// STK push and only then persists the pending record, so a stored
/// transaction always corresponds to a provider-accepted request.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let phone_number = normalize_phone_number(&request.phone_number)?;

    info!(
        "Initiating payment of KSh {} for {}",
        request.amount, phone_number
    );

    let payment_response = state
        .mpesa
        .initiate_stk_push(
            request.amount,
            &phone_number,
            &request.account_reference,
            &request.transaction_desc,
        )
        .await?;

    let transaction = state
        .store
        .create(NewTransaction {
            merchant_request_id: payment_response.merchant_request_id.clone(),
            checkout_request_id: payment_response.checkout_request_id.clone(),
            amount: request.amount,
            phone_number,
            account_reference: request.account_reference,
            transaction_desc: request.transaction_desc,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment initiated successfully",
        "transaction": transaction,
        "payment_response": payment_response,
    })))
}

/// POST /callback — the provider retries on non-200, so this always
/// answers 200; internal resolution failures are logged and reported
/// as `success: false`.
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    match process_callback(state.store.as_ref(), payload).await {
        Ok(CallbackOutcome::Completed(tx)) => {
            info!("Callback completed transaction {}", tx.id);
            Json(json!({ "success": true }))
        }
        Ok(CallbackOutcome::Failed(tx)) => {
            info!("Callback failed transaction {}", tx.id);
            Json(json!({ "success": true }))
        }
        Ok(CallbackOutcome::AlreadyFinal(_)) => Json(json!({ "success": true })),
        Err(e) => {
            error!("Callback processing error: {}", e);
            Json(json!({ "success": false }))
        }
    }
}

/// GET /status/:id
pub async fn get_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let transaction = state
        .store
        .get(&id)
        .await?
        .ok_or(AppError::TransactionNotFound)?;

    Ok(Json(json!({ "transaction": transaction })))
}

/// POST /check-payment-status — long-polls the store until the payment
/// resolves or the configured attempt budget runs out. A timeout means
/// "unable to confirm", not that the payment failed; a late callback
/// may still complete it.
pub async fn check_payment_status(
    State(state): State<AppState>,
    Json(request): Json<CheckPaymentStatusRequest>,
) -> Result<Json<Value>> {
    let poller = StatusPoller::new(
        Duration::from_secs(state.config.poll_interval_secs),
        state.config.poll_max_attempts,
    );
    let source = StoreStatusSource::new(Arc::clone(&state.store));

    match poller.poll(&source, &request.transaction_id).await {
        PollOutcome::Completed(transaction) => Ok(Json(json!({
            "status": "completed",
            "message": "Payment completed successfully",
            "transaction": transaction,
        }))),
        PollOutcome::Failed(transaction) => Ok(Json(json!({
            "status": "failed",
            "message": "Payment failed or was cancelled",
            "transaction": transaction,
        }))),
        PollOutcome::TimedOut => Ok(Json(json!({
            "status": "timeout",
            "message": "Unable to confirm payment status",
        }))),
    }
}

/// GET /transactions — newest first.
pub async fn get_transactions(State(state): State<AppState>) -> Result<Json<Value>> {
    let transactions = state.store.list_all().await?;

    Ok(Json(json!({
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

/// GET /analytics?range=7days|30days|90days|1year
pub async fn get_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>> {
    let transactions = state.store.list_all().await?;
    let analytics = aggregate(
        &transactions,
        query.range.unwrap_or_default(),
        Utc::now(),
    );

    Ok(Json(serde_json::to_value(analytics)?))
}

/// GET /query/:checkout_request_id — asks Daraja directly; the stored
/// record stays untouched.
pub async fn query_provider_status(
    State(state): State<AppState>,
    Path(checkout_request_id): Path<String>,
) -> Result<Json<Value>> {
    let provider_response = state.mpesa.query_stk_status(&checkout_request_id).await?;

    Ok(Json(json!({
        "checkout_request_id": checkout_request_id,
        "provider_response": provider_response,
    })))
}
