//! Guest client error types

use super::types::NormalizeError;
use thiserror::Error;

/// Errors that can occur when talking to the guest sheet endpoint
#[derive(Error, Debug)]
pub enum GuestError {
    /// Connection-level failure that outlived the retry budget
    #[error("Network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Client-side failure that is never retried (request build, body read)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote answered, but not with a success status
    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not JSON, or lacked the expected field
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid guest record at index {index}: {reason}")]
    InvalidRecord {
        index: usize,
        #[source]
        reason: NormalizeError,
    },
}

impl GuestError {
    /// Whether the failure came from the network rather than the remote
    pub fn is_transient(&self) -> bool {
        matches!(self, GuestError::Network { .. })
    }
}

/// Result type alias for guest client operations
pub type GuestResult<T> = Result<T, GuestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GuestError::Status {
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Remote returned 503: Service Unavailable");
        assert!(!err.is_transient());

        let err = GuestError::InvalidRecord {
            index: 4,
            reason: NormalizeError::MissingId,
        };
        assert_eq!(err.to_string(), "Invalid guest record at index 4: missing id");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GuestError = json_err.into();
        assert!(matches!(err, GuestError::Decode(_)));
    }
}
