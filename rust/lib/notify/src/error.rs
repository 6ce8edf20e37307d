use thiserror::Error;

// ====================================================================
// Error codes
// ====================================================================
//
// Stable, machine-readable identifiers. Log consumers match on these,
// never on the human-readable message string.

pub mod error_code {
    pub const SERVER: &str = "SERVER";
    pub const NETWORK: &str = "NETWORK";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const DECODE: &str = "DECODE";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
}

// ====================================================================
// GatewayError
// ====================================================================

/// Failure of a call to the remote notification API.
///
/// These never reach the presentation layer: the controller turns them
/// into a rollback, a notice, or a forced resynchronization.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The gateway refused the call without reaching a server.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e)
        }
    }
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Server { .. } => error_code::SERVER,
            GatewayError::Network(_) => error_code::NETWORK,
            GatewayError::Timeout => error_code::TIMEOUT,
            GatewayError::Auth(_) => error_code::UNAUTHENTICATED,
            GatewayError::Decode(_) => error_code::DECODE,
            GatewayError::Unavailable(_) => error_code::UNAVAILABLE,
            GatewayError::InvalidUrl(_) => error_code::INVALID_CONFIG,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Server { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Network(_) | GatewayError::Timeout | GatewayError::Unavailable(_) => true,
            GatewayError::Auth(_) | GatewayError::Decode(_) | GatewayError::InvalidUrl(_) => false,
        }
    }
}

// ====================================================================
// ConfigError
// ====================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        error_code::INVALID_CONFIG
    }
}
