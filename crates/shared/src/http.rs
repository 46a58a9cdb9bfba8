//! HTTP fetch adapter for the catalog backend.
//!
//! Wraps a single `reqwest::Client` (reused for connection pooling) behind a tokio semaphore
//! that caps concurrent requests. Every call takes a `CancellationToken`; cancelling it drops
//! the in-flight request and resolves to [`ClientError::Cancelled`], which callers treat as
//! an outcome rather than a failure.
//!
//! Response normalization:
//! - 204 or an empty body resolves to `Ok(None)`
//! - any other 2xx is parsed as JSON
//! - non-2xx resolves to `ClientError::Http` carrying the status and raw body

use std::sync::Arc;
use std::time::Instant;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Query string pairs in the order they should appear on the wire.
pub type QueryPairs = Vec<(&'static str, String)>;

pub struct HttpClient {
    client: Client,
    base_url: Url,
    semaphore: Arc<Semaphore>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a backend path (e.g. `/movies/3/reviews`) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid request path {path}: {e}")))
    }

    /// Issues `GET {path}?{query}` and returns the decoded JSON body.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.url(path)?;
        let request = self.client.get(url.clone()).query(query);
        self.execute(Method::GET, &url, request, cancel).await
    }

    /// Issues `PUT {path}` with a JSON body and returns the decoded JSON response.
    pub async fn put_json<B>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let request = self.client.put(url.clone()).json(body);
        self.execute(Method::PUT, &url, request, cancel).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let start = Instant::now();
        tracing::debug!(method = %method, url = %url, "request issued");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.send(request) => result,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::debug!(
                method = %method,
                url = %url,
                duration_ms = duration_ms,
                outcome = "success",
                "request completed"
            ),
            Err(ClientError::Cancelled) => tracing::debug!(
                method = %method,
                url = %url,
                duration_ms = duration_ms,
                outcome = "cancelled",
                "request cancelled"
            ),
            Err(e) => tracing::warn!(
                method = %method,
                url = %url,
                duration_ms = duration_ms,
                status = e.status(),
                outcome = "error",
                error = %e,
                "request failed"
            ),
        }

        outcome
    }

    async fn send(&self, request: RequestBuilder) -> Result<Option<Value>, ClientError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ClientError::Network("request limiter closed".into()))?;

        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
