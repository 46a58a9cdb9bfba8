//! Client configuration read from environment variables.
//!
//! Environment variables:
//! - `API_BASE_URL`: backend root URL (default: http://localhost:5000)
//! - `REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
//! - `MAX_CONCURRENT_REQUESTS`: in-flight request cap (default: 6)
//! - `STALE_TIME_MS`: how long a successful fetch counts as fresh (default: 0)
//! - `GC_TIME_MS`: how long an unobserved entry is retained (default: 300000)
//! - `FILTER_DEBOUNCE_MS`: quiet period before filter edits propagate (default: 500)
//! - `TOAST_DURATION_MS`: default toast auto-hide delay (default: 3000)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::ClientError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub filter_debounce: Duration,
    /// Kept signed: zero or negative disables auto-hide.
    pub toast_duration_ms: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base url is valid"),
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: 6,
            stale_time: Duration::ZERO,
            gc_time: Duration::from_millis(300_000),
            filter_debounce: Duration::from_millis(500),
            toast_duration_ms: 3000,
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Unparseable numbers fall
    /// back to their defaults; an invalid base URL is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = match lookup("API_BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => defaults.api_base_url,
        };

        let parsed = |name: &str| lookup(name).and_then(|v| parse_num::<u64>(&v));

        Ok(Self {
            api_base_url,
            request_timeout: parsed("REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_concurrent_requests: lookup("MAX_CONCURRENT_REQUESTS")
                .and_then(|v| parse_num::<usize>(&v))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_requests),
            stale_time: parsed("STALE_TIME_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.stale_time),
            gc_time: parsed("GC_TIME_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.gc_time),
            filter_debounce: parsed("FILTER_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.filter_debounce),
            toast_duration_ms: lookup("TOAST_DURATION_MS")
                .and_then(|v| parse_num::<i64>(&v))
                .unwrap_or(defaults.toast_duration_ms),
        })
    }
}

fn parse_num<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// Parses a base URL, ensuring a trailing slash so relative joins keep any path prefix.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ClientError::Config(format!("API_BASE_URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!(
            "API_BASE_URL: {raw} cannot be a base"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
