// services/mpesa_service.rs
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::services::token_cache::AccessTokenCache;

#[derive(Debug, Serialize)]
pub struct StkPushPayload {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

#[derive(Debug, Serialize)]
struct StkQueryPayload {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct DarajaError {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

pub struct MpesaService {
    config: AppConfig,
    client: Client,
    token_cache: AccessTokenCache,
}

impl MpesaService {
    pub fn new(config: AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let token_cache = AccessTokenCache::for_daraja(&config);

        MpesaService {
            config,
            client,
            token_cache,
        }
    }

    /// 14-digit timestamp the Daraja password derivation expects.
    fn timestamp() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    fn generate_password(&self, timestamp: &str) -> String {
        let password_string = format!(
            "{}{}{}",
            self.config.mpesa_short_code, self.config.mpesa_passkey, timestamp
        );
        base64.encode(password_string)
    }

    pub async fn get_access_token(&self) -> Result<String> {
        self.token_cache.get_token().await
    }

    /// Sends the STK push. Callers must pass an already normalized
    /// `254XXXXXXXXX` number and a positive amount. A successful return
    /// means the provider accepted the request and a charge prompt is on
    /// its way to the subscriber's handset; only then should a record be
    /// created.
    pub async fn initiate_stk_push(
        &self,
        amount: f64,
        phone_number: &str,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse> {
        info!("STK push for {} - KSh {}", phone_number, amount);

        if amount <= 0.0 {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        let access_token = self.token_cache.get_token().await?;
        let timestamp = Self::timestamp();
        let password = self.generate_password(&timestamp);

        let (_, stk_url, _) = self.config.get_mpesa_urls();

        let payload = StkPushPayload {
            business_short_code: self.config.mpesa_short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: format!("{}", amount),
            party_a: phone_number.to_string(),
            party_b: self.config.mpesa_short_code.clone(),
            phone_number: phone_number.to_string(),
            callback_url: self.config.mpesa_callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: transaction_desc.to_string(),
        };

        let response = self
            .client
            .post(&stk_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("STK push failed: {} - {}", status, body);

            let daraja_err: DarajaError = serde_json::from_str(&body).unwrap_or_default();
            return Err(AppError::PaymentInitiation {
                code: if daraja_err.error_code.is_empty() {
                    status.as_u16().to_string()
                } else {
                    daraja_err.error_code
                },
                description: if daraja_err.error_message.is_empty() {
                    body
                } else {
                    daraja_err.error_message
                },
            });
        }

        let stk_response: StkPushResponse = response.json().await?;

        if stk_response.response_code != "0" {
            error!(
                "STK push rejected: [{}] {}",
                stk_response.response_code, stk_response.response_description
            );
            return Err(AppError::PaymentInitiation {
                code: stk_response.response_code,
                description: stk_response.response_description,
            });
        }

        info!("STK push accepted: {}", stk_response.merchant_request_id);
        Ok(stk_response)
    }

    /// Daraja-side status lookup for a checkout request. Returns the
    /// provider's response untyped; the store remains the source of
    /// truth for our own records.
    pub async fn query_stk_status(&self, checkout_request_id: &str) -> Result<serde_json::Value> {
        let access_token = self.token_cache.get_token().await?;
        let timestamp = Self::timestamp();
        let password = self.generate_password(&timestamp);

        let (_, _, query_url) = self.config.get_mpesa_urls();

        let payload = StkQueryPayload {
            business_short_code: self.config.mpesa_short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let response = self
            .client
            .post(&query_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("STK query failed: {} - {}", status, body);
            return Err(AppError::HttpClient(format!("STK query failed: {}", status)));
        }

        Ok(response.json().await?)
    }
}
