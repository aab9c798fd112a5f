//! Error types for the smart money finder

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the smart money finder
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (rejected before any fetch)
    #[error("At least 2 distinct token addresses are required, got {provided}")]
    InsufficientTokens { provided: usize },

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    // Configuration errors
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Provider errors (absorbed per item by the pipeline)
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    // Decoding errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Check if this error came from a data provider call.
    ///
    /// Provider failures are local to one token or wallet and never abort a request.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::Http(_) | Error::Deserialization(_)
        )
    }

    /// Check if this error is a caller input error
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InsufficientTokens { .. } | Error::InvalidThreshold(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}
