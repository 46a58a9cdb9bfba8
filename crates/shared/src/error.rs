//! Client error types with machine-readable codes.
//!
//! Every failure the catalog client can observe maps to one variant. Errors are `Clone`
//! because a single failed fetch is shared with every subscriber of the cache entry.

/// Unified error type for the catalog client.
///
/// `Cancelled` is not a failure: it marks a request that its caller aborted. The query
/// cache never records it as an entry error and mutation hooks never see it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns the machine-readable error code (e.g. "HTTP_ERROR").
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_returns_correct_string() {
        assert_eq!(ClientError::Network("down".into()).code(), "NETWORK_ERROR");
        assert_eq!(
            ClientError::Http {
                status: 500,
                body: String::new(),
            }
            .code(),
            "HTTP_ERROR"
        );
        assert_eq!(ClientError::Cancelled.code(), "CANCELLED");
        assert_eq!(
            ClientError::Validation("x".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(ClientError::Decode("x".into()).code(), "DECODE_ERROR");
        assert_eq!(ClientError::Config("x".into()).code(), "CONFIG_ERROR");
    }

    #[test]
    fn status_only_present_for_http_errors() {
        let err = ClientError::Http {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(ClientError::Network("x".into()).status(), None);
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = ClientError::Http {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 502: bad gateway"
        );
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(ClientError::Cancelled.is_cancelled());
        assert!(!ClientError::Validation("x".into()).is_cancelled());
    }

    #[test]
    fn json_errors_become_decode_errors() {
        let err: ClientError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), "DECODE_ERROR");
    }
}
