#![forbid(unsafe_code)]

use thiserror::Error;

pub type NetResult<T> = Result<T, NetError>;

/// Centralized error type for capstan-net.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Timeout")]
    Timeout,

    #[error("credential source failed: {0}")]
    Credentials(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for NetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        // Alternate formatting includes the full error chain
        // (e.g. "error sending request …: connection refused").
        Self::Http(format!("{e:#}"))
    }
}
