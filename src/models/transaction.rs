use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// A terminal status never changes again, no matter what the
    /// provider redelivers.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical payment record. One row per initiated STK push; the
/// checkout request id is unique across the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub amount: f64,
    pub phone_number: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpesa_receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the caller supplies when a record is first persisted.
/// Status and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub amount: f64,
    pub phone_number: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

impl NewTransaction {
    pub fn into_transaction(self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::new_v4().to_string(),
            merchant_request_id: self.merchant_request_id,
            checkout_request_id: self.checkout_request_id,
            amount: self.amount,
            phone_number: self.phone_number,
            account_reference: self.account_reference,
            transaction_desc: self.transaction_desc,
            status: TransactionStatus::Pending,
            mpesa_receipt_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by the callback handler. Only supplied
/// fields change; `updated_at` is stamped by the store.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub mpesa_receipt_number: Option<String>,
    pub amount: Option<f64>,
    pub phone_number: Option<String>,
}

impl Transaction {
    pub fn apply(&mut self, update: TransactionUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(receipt) = update.mpesa_receipt_number {
            self.mpesa_receipt_number = Some(receipt);
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(phone_number) = update.phone_number {
            self.phone_number = phone_number;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(range(min = 1.0, message = "amount must be greater than 0"))]
    pub amount: f64,
    #[validate(length(min = 1, message = "phone_number is required"))]
    pub phone_number: String,
    #[validate(length(min = 1, message = "account_reference is required"))]
    pub account_reference: String,
    #[validate(length(min = 1, message = "transaction_desc is required"))]
    pub transaction_desc: String,
}

/// Normalizes a Kenyan subscriber number to the `254XXXXXXXXX` form the
/// Daraja API expects. Accepts `07XXXXXXXX`, `+2547XXXXXXXX` and
/// `2547XXXXXXXX` style inputs; anything that does not reduce to twelve
/// digits starting with 254 is rejected.
pub fn normalize_phone_number(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("254{}", rest)
    } else {
        digits
    };

    if normalized.len() == 12 && normalized.starts_with("254") {
        Ok(normalized)
    } else {
        Err(AppError::validation(format!(
            "invalid Kenyan phone number: {}",
            raw
        )))
    }
}
