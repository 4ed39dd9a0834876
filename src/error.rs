//! Error types shared by the API client, the stores and the player.

use thiserror::Error;

/// Failures talking to the remote catalog/authentication API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 401/403 from the server, or no token for an endpoint that needs one.
    #[error("Not authorized")]
    Unauthorized,

    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("Network error: {reason}")]
    Network {
        /// Transport-level reason
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// `message` field of the error body, or the status reason
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Unexpected response: {reason}")]
    Decode {
        /// Deserialization failure
        reason: String,
    },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Map a non-success status and its body to the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 || status == 403 {
            return ApiError::Unauthorized;
        }

        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {status}"));

        ApiError::Server { status, message }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode { reason: err.to_string() }
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), "")
        } else {
            ApiError::Network { reason: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode { reason: err.to_string() }
    }
}

/// Failures of the media primitive behind a playback session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// Worth another attempt (stream fetch failed, stall, dropped connection).
    #[error("Playback failed: {0}")]
    Retryable(String),

    /// Retrying the same source cannot help (no stream for the episode).
    #[error("Playback unavailable: {0}")]
    Terminal(String),
}

impl PlaybackError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackError::Terminal(_))
    }
}

/// Failures of the local key-value storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;
