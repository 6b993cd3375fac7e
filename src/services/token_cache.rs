// services/token_cache.rs
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::info;

use crate::errors::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    // Daraja sends the validity window as a string of seconds.
    pub expires_in: String,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where bearer credentials come from. Production talks to the Daraja
/// OAuth endpoint; tests substitute a counting fake.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<AuthResponse>;
}

pub struct DarajaCredentialSource {
    client: Client,
    auth_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl DarajaCredentialSource {
    pub fn new(
        client: Client,
        auth_url: String,
        consumer_key: String,
        consumer_secret: String,
    ) -> Self {
        DarajaCredentialSource {
            client,
            auth_url,
            consumer_key,
            consumer_secret,
        }
    }
}

#[async_trait]
impl CredentialSource for DarajaCredentialSource {
    async fn fetch(&self) -> Result<AuthResponse> {
        let auth_string = format!("{}:{}", self.consumer_key, self.consumer_secret);
        let encoded_auth = base64.encode(auth_string);

        let response = self
            .client
            .get(&self.auth_url)
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::auth(format!("HTTP {}: {}", status, body)));
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Err(AppError::auth("empty response from OAuth endpoint"));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::auth(format!("invalid OAuth response: {}", e)))
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide bearer token cache. Returns the cached token while the
/// clock is strictly before its expiry, otherwise fetches a fresh one.
/// Two racing refreshes cost one redundant fetch, nothing more.
pub struct AccessTokenCache {
    source: Box<dyn CredentialSource>,
    clock: Box<dyn Clock>,
    cached: RwLock<Option<CachedToken>>,
}

impl AccessTokenCache {
    pub fn new(source: Box<dyn CredentialSource>, clock: Box<dyn Clock>) -> Self {
        AccessTokenCache {
            source,
            clock,
            cached: RwLock::new(None),
        }
    }

    pub fn for_daraja(config: &crate::config::AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let (auth_url, _, _) = config.get_mpesa_urls();
        let source = DarajaCredentialSource::new(
            client,
            auth_url,
            config.mpesa_consumer_key.clone(),
            config.mpesa_consumer_secret.clone(),
        );

        AccessTokenCache::new(Box::new(source), Box::new(SystemClock))
    }

    pub async fn get_token(&self) -> Result<String> {
        {
            let cached = self.cached.read().unwrap();
            if let Some(cached) = cached.as_ref() {
                if self.clock.now() < cached.expires_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        info!("Requesting new M-Pesa access token");
        let auth = self.source.fetch().await?;

        if auth.access_token.is_empty() {
            return Err(AppError::auth("no access token in OAuth response"));
        }

        let expires_in: i64 = auth
            .expires_in
            .trim()
            .parse()
            .map_err(|_| AppError::auth(format!("invalid expires_in: {}", auth.expires_in)))?;
        if expires_in <= 0 {
            return Err(AppError::auth(format!(
                "non-positive expires_in: {}",
                expires_in
            )));
        }

        let expires_at = self.clock.now() + chrono::Duration::seconds(expires_in);
        {
            let mut cached = self.cached.write().unwrap();
            *cached = Some(CachedToken {
                token: auth.access_token.clone(),
                expires_at,
            });
        }

        info!("Access token obtained, valid for {}s", expires_in);
        Ok(auth.access_token)
    }
}
