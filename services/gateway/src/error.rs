use thiserror::Error;

/// Errors raised by the gateway and the platform client.
///
/// Every variant carries a human-readable message; the credential form shows
/// it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    NotConfigured(String),

    #[error("{message}")]
    Platform {
        /// HTTP status of the failed response
        status: u16,
        /// Platform error code, when the body carried one
        code: Option<String>,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Failed to read file: {0}")]
    Io(String),
}

impl GatewayError {
    /// Create a platform error from a status and message
    pub fn platform(status: u16, message: impl Into<String>) -> Self {
        Self::Platform {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// The message to surface to a user
    pub fn message(&self) -> String {
        match self {
            Self::Platform { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
