use thiserror::Error;

/// Errors from the metadata lookup client.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}
