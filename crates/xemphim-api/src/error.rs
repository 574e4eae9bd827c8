use thiserror::Error;

/// Errors from the catalog backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("device token not found, enable notifications first")]
    MissingDeviceToken,
}
