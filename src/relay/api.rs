//! Raw HTTP calls to the Telegram Bot API.
//!
//! The relay loops only see the [`BotApi`] trait, so tests can swap the
//! network for a scripted fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::RelayError;

/// Grace period on top of the long-poll ceiling before the client gives up.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait BotApi: Send + Sync {
    /// POST an already-encoded `sendMessage` body.
    async fn send_message(&self, body: String) -> Result<ApiResponse, RelayError>;

    /// Long-poll for updates with ids of at least `offset`.
    async fn get_updates(&self, offset: i64, timeout: Duration)
        -> Result<ApiResponse, RelayError>;
}

/// [`BotApi`] over HTTPS.
pub struct HttpBotApi {
    client: Client,
    base_url: String,
}

impl HttpBotApi {
    /// Create a client for `bot_token` against `api_base_url`
    /// (normally `https://api.telegram.org`).
    pub fn new(bot_token: &str, api_base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), bot_token),
        }
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn send_message(&self, body: String) -> Result<ApiResponse, RelayError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .header("Content-Type", "application/json")
            .timeout(SEND_TIMEOUT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }

    async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<ApiResponse, RelayError> {
        debug!(offset, "getUpdates");

        let response = self
            .client
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[("timeout", timeout.as_secs() as i64), ("offset", offset)])
            .timeout(poll_request_timeout(timeout))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

/// Client-side deadline for a long poll with the given server-side ceiling.
fn poll_request_timeout(timeout: Duration) -> Duration {
    timeout.saturating_add(POLL_TIMEOUT_MARGIN)
}
