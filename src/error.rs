//! Error types for the admission pipeline.
//!
//! Every failure is handled inside the decision engine and turned into
//! either an HTTP error (malformed envelope) or a structured denial.

use thiserror::Error;

/// Error type for admission pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound envelope or object snapshot could not be parsed
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Object snapshot parsed but does not have the expected shape
    #[error("Failed to extract annotations: {0}")]
    Extraction(String),

    /// Image locator has no separator to pin a tag or digest
    #[error("Invalid image reference {0:?}: no tag or digest separator")]
    InvalidReference(String),

    /// Registry login handshake failed or timed out
    #[error("Registry authentication failed: {0}")]
    AuthFailure(String),

    /// External verifier reported failure; detail is kept verbatim
    #[error("Image verification failed: {0}")]
    VerificationFailed(String),

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable reason string reported alongside a denial
    pub fn reason(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "MalformedInput",
            Error::Extraction(_) => "ExtractionFailure",
            Error::InvalidReference(_) => "InvalidReference",
            Error::AuthFailure(_) => "AuthFailure",
            Error::VerificationFailed(_) => "VerificationFailed",
            Error::Config(_) => "ConfigError",
        }
    }

    /// Error text without the category prefix, for messages that already
    /// carry their own context
    pub fn detail(&self) -> String {
        match self {
            Error::InvalidReference(reference) => {
                format!("{:?} has no tag or digest separator", reference)
            }
            Error::MalformedInput(detail)
            | Error::Extraction(detail)
            | Error::AuthFailure(detail)
            | Error::VerificationFailed(detail)
            | Error::Config(detail) => detail.clone(),
        }
    }

    /// Check if this error is terminal for the whole HTTP request rather than
    /// a denial of the admission request
    pub fn is_http_error(&self) -> bool {
        matches!(self, Error::MalformedInput(_))
    }
}

/// Result type alias for admission pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
