//! Error types for the mcp_google_spreadsheet crate.

use thiserror::Error;

/// Errors that can occur while resolving paths or talking to Google APIs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    /// A later step of a multi-step operation failed after earlier steps
    /// were already applied remotely.
    #[error("{step}: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Stable machine-readable code reported alongside tool failures.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidPath(_) => "invalid_path",
            Error::NotFound(_) => "not_found",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::AuthenticationError(_)
            | Error::CredentialsFileError(_)
            | Error::CredentialsParseError(_)
            | Error::JwtError(_)
            | Error::TokenRefreshError(_) => "auth_failed",
            Error::HttpError(_) | Error::ApiError { .. } | Error::InvalidUrl(_) => {
                "remote_call_failed"
            }
            Error::StepFailed { source, .. } => source.code(),
        }
    }

    /// Wrap this error as the failure of a named step.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Error::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for Error.
pub type Result<T> = std::result::Result<T, Error>;
