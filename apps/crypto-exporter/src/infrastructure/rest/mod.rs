//! REST Client
//!
//! Thin `reqwest` wrapper shared by the exchange adapters: base URL, request
//! timeout, JSON decoding, and HTTP status classification into
//! [`AdapterError`]. No retries here; the poll cycle decides what to retry.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::application::ports::AdapterError;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// HTTP client bound to one exchange's base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Transient` if the TLS backend cannot be
    /// initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crypto-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Start a GET request.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// Start a POST request.
    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// GET a path with query parameters and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`RestClient::send_json`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AdapterError> {
        let mut request = self.get(path);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send_json(request).await
    }

    /// Send a prepared request and decode the JSON body.
    ///
    /// # Errors
    ///
    /// - `Transient` on connection failure, timeout, 408, or 5xx
    /// - `RateLimited` on 429
    /// - `Unauthorized` on 401 or 403
    /// - `Api` on any other non-success status
    /// - `Malformed` if the body is not the expected JSON
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AdapterError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Transient(format!("request timed out: {e}"))
            } else {
                AdapterError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(categorize_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| AdapterError::Malformed(e.to_string()))
    }
}

/// Map a non-success status to an adapter error.
fn categorize_status(status: StatusCode, body: &str) -> AdapterError {
    let message = truncate(body);
    match status.as_u16() {
        429 => AdapterError::RateLimited,
        408 | 500..=599 => AdapterError::Transient(format!("HTTP {status}: {message}")),
        401 | 403 => AdapterError::Unauthorized(message),
        code => AdapterError::Api {
            status: code,
            message,
        },
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let mut short: String = body.chars().take(MAX_ERROR_BODY).collect();
        short.push('…');
        short
    }
}
