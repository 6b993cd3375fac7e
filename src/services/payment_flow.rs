// services/payment_flow.rs
//
// The payment lifecycle state machine. A record is born `pending` and
// moves exactly once to `completed` or `failed` when the provider's
// asynchronous result arrives; nothing ever moves it back.
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::callback::StkCallbackEnvelope;
use crate::models::transaction::{Transaction, TransactionStatus, TransactionUpdate};
use crate::store::TransactionStore;

#[derive(Debug)]
pub enum CallbackOutcome {
    /// Transitioned to `completed` with provider metadata applied.
    Completed(Transaction),
    /// Transitioned to `failed`.
    Failed(Transaction),
    /// Record was already terminal; redelivery ignored.
    AlreadyFinal(Transaction),
}

/// Applies a provider callback to the stored transaction. One store
/// mutation per effective callback, no outbound calls.
pub async fn process_callback(
    store: &dyn TransactionStore,
    payload: serde_json::Value,
) -> Result<CallbackOutcome> {
    let envelope = StkCallbackEnvelope::parse(payload)?;
    let callback = envelope.body.stk_callback;

    let transaction = store
        .get_by_checkout_request_id(&callback.checkout_request_id)
        .await?
        .ok_or_else(|| AppError::UnknownTransaction(callback.checkout_request_id.clone()))?;

    // Terminal states never regress, so a redelivered callback is a
    // no-op rather than a second mutation.
    if transaction.status.is_terminal() {
        info!(
            "Callback redelivery for {} ignored, already {}",
            callback.checkout_request_id, transaction.status
        );
        return Ok(CallbackOutcome::AlreadyFinal(transaction));
    }

    if callback.is_success() {
        // The provider's reported amount and phone number reflect what
        // was actually charged and override the client-supplied values.
        let update = TransactionUpdate {
            status: Some(TransactionStatus::Completed),
            mpesa_receipt_number: callback.receipt_number(),
            amount: callback.amount(),
            phone_number: callback.phone_number(),
        };

        let updated = store
            .update(&transaction.id, update)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(callback.checkout_request_id.clone()))?;

        info!(
            "Payment {} completed, receipt {}",
            updated.id,
            updated.mpesa_receipt_number.as_deref().unwrap_or("-")
        );
        Ok(CallbackOutcome::Completed(updated))
    } else {
        // The failure description is diagnostic only and is not persisted.
        warn!(
            "Payment {} failed: [{}] {}",
            transaction.id, callback.result_code, callback.result_desc
        );

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Failed),
            ..Default::default()
        };

        let updated = store
            .update(&transaction.id, update)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(callback.checkout_request_id.clone()))?;

        Ok(CallbackOutcome::Failed(updated))
    }
}
