use thiserror::Error;

/// Errors raised by the GitHub and OpenAI clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Caller-supplied arguments failed a local precondition. No request was sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote answered with a non-2xx status.
    #[error("API error: {status} {status_text} - URL: {url}")]
    Api {
        status: u16,
        status_text: String,
        url: String,
    },

    #[error("request was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// User-initiated aborts should be dropped silently rather than shown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// True for 401/403 responses, i.e. a token that is missing, expired or lacks scope.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Api { status: 401 | 403, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
