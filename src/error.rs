//! Error taxonomy for docrev.

use thiserror::Error;

/// Errors produced by the config, auth, Drive, and archive layers.
///
/// `Download` failures (and network errors hit while fetching a single
/// revision) are recoverable at the orchestration level: the revision is
/// skipped and the run continues. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration missing or unusable.
    #[error("Missing configuration: {0}")]
    Config(String),

    /// Interactive consent not completed in time.
    #[error("Authorization timed out after {0} seconds")]
    AuthTimeout(u64),

    /// Credential invalid or unobtainable.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The Drive API rejected a metadata or listing request.
    #[error("Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A single revision export could not be fetched.
    #[error("Download failed (status {status}): {message}")]
    Download { status: u16, message: String },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The API answered with something we could not decode.
    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

/// Result type for docrev operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let error = Error::Api {
            status: 404,
            message: "File not found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Drive API error (status 404): File not found"
        );
    }

    #[test]
    fn test_timeout_display_names_the_bound() {
        let error = Error::AuthTimeout(120);
        assert_eq!(error.to_string(), "Authorization timed out after 120 seconds");
    }
}
