//! Error types for feedhub.

use thiserror::Error;

/// Common error type for feedhub.
#[derive(Error, Debug)]
pub enum FeedhubError {
    /// Database error.
    ///
    /// Raised by the persistence sink. Fatal for the fetch cycle of the
    /// source being processed, never for the whole batch.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A user-supplied source reference could not be resolved.
    #[error("could not resolve source: {0}")]
    Resolution(String),

    /// Network or parse error while retrieving a primary feed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Secondary lookup (gallery, score, avatar, embed) failed.
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for FeedhubError {
    fn from(e: sqlx::Error) -> Self {
        FeedhubError::Database(e.to_string())
    }
}

/// Result type alias for feedhub operations.
pub type Result<T> = std::result::Result<T, FeedhubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = FeedhubError::Resolution("not a subreddit".to_string());
        assert_eq!(err.to_string(), "could not resolve source: not a subreddit");
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FeedhubError::Fetch("HTTP error: 503".to_string());
        assert_eq!(err.to_string(), "fetch error: HTTP error: 503");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = FeedhubError::NotFound("source".to_string());
        assert_eq!(err.to_string(), "source not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FeedhubError = io_err.into();
        assert!(matches!(err, FeedhubError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: FeedhubError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, FeedhubError::Database(_)));
    }
}
