use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// HTTP client for the movie-review backend. Each resource (movies, reviews,
/// favorites, users) adds its calls in its own module.
#[derive(Debug, Clone)]
pub struct MboxClient {
    pub(super) client: Client,
    base: String,
}

/// The `{status, message, data}` wrapper most endpoints reply with.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub status: Option<String>,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Into the payload, treating a non-success status (compared
    /// case-insensitively) as a rejection carrying the server's message.
    pub fn into_data(self) -> ApiResult<Option<T>> {
        if !is_success(self.status.as_deref()) {
            return Err(rejected(self.message));
        }
        Ok(self.data)
    }
}

pub(super) fn is_success(status: Option<&str>) -> bool {
    status
        .map(|s| s.trim().eq_ignore_ascii_case("success"))
        .unwrap_or(false)
}

pub(super) fn rejected(message: Option<String>) -> ApiError {
    ApiError::Rejected {
        message: message.unwrap_or_default(),
    }
}

impl MboxClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let user_agent = format!("cinebox/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.http_timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            base: config.api_base.clone(),
        })
    }

    pub fn new(api_base: &str) -> Result<Self> {
        Self::from_config(&Config::for_base(api_base))
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Sends the request and returns the body of a 2xx response; other
    /// statuses are classified by code.
    pub(super) async fn send(&self, request: RequestBuilder) -> ApiResult<Vec<u8>> {
        let (status, body) = self.send_raw(request).await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status));
        }
        Ok(body)
    }

    /// Like [`send`](Self::send), but a non-2xx reply that carries a
    /// `message` becomes `Rejected` with that message. Used by the account
    /// endpoints, which report bad credentials and duplicate emails this way.
    pub(super) async fn send_lenient(&self, request: RequestBuilder) -> ApiResult<Vec<u8>> {
        let (status, body) = self.send_raw(request).await?;
        if (200..300).contains(&status) {
            return Ok(body);
        }
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }
        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody {
                message: Some(message),
            }) if !message.trim().is_empty() => Err(ApiError::Rejected { message }),
            _ => Err(ApiError::from_status(status)),
        }
    }

    async fn send_raw(&self, request: RequestBuilder) -> ApiResult<(u16, Vec<u8>)> {
        let res = request.send().await.map_err(|e| {
            warn!("Backend request failed: {}", e);
            ApiError::from_reqwest(&e)
        })?;
        let status = res.status().as_u16();
        let url = res.url().path().to_string();
        let body = res
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;
        debug!(status, path = %url, bytes = body.len(), "Backend response");
        Ok((status, body.to_vec()))
    }

    pub(super) async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let body = self.send(request).await?;
        decode(&body)
    }
}

pub(super) fn decode<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))
}
