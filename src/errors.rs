// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("M-Pesa authentication failed: {0}")]
    Auth(String),

    #[error("Payment initiation rejected: [{code}] {description}")]
    PaymentInitiation { code: String, description: String },

    #[error("Malformed callback payload: {0}")]
    MalformedCallback(String),

    #[error("No transaction for CheckoutRequestID {0}")]
    UnknownTransaction(String),

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::Auth(_) => (StatusCode::BAD_GATEWAY, "M-Pesa authentication failed".to_string()),
            AppError::PaymentInitiation { .. } => (StatusCode::BAD_GATEWAY, "Payment initiation rejected".to_string()),
            AppError::MalformedCallback(_) => (StatusCode::BAD_REQUEST, "Malformed callback".to_string()),
            AppError::UnknownTransaction(_) => (StatusCode::NOT_FOUND, "Unknown transaction".to_string()),
            AppError::TransactionNotFound => (StatusCode::NOT_FOUND, "Transaction not found".to_string()),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "Upstream request failed".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpClient(format!("HTTP request failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        AppError::Auth(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
