//! Error types for labtrack.

use thiserror::Error;

/// Result type alias using labtrack's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for labtrack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Field content failed a validator
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every slug candidate and the primary-id fallback are already taken
    #[error("Slug exhausted: no unique candidate (fallback {fallback} is taken)")]
    SlugExhausted { fallback: String },

    /// Unique or protected-reference constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a validation error from anything displayable.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True when the error is a unique violation on `sample.slug`.
    ///
    /// Two writers can pick the same candidate between the lookup and the
    /// insert; the unique index turns that into this error and the write
    /// path regenerates the slug.
    pub fn is_slug_conflict(&self) -> bool {
        matches!(self, Error::Conflict(msg) if msg.contains("sample_slug"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("sample abc".to_string());
        assert_eq!(err.to_string(), "Not found: sample abc");
    }

    #[test]
    fn test_error_display_validation() {
        let err = Error::validation("Invalid JSON: expected value");
        assert_eq!(err.to_string(), "Validation error: Invalid JSON: expected value");
    }

    #[test]
    fn test_error_display_slug_exhausted() {
        let err = Error::SlugExhausted {
            fallback: "0190-abc".to_string(),
        };
        assert!(err.to_string().contains("0190-abc"));
        assert!(err.to_string().starts_with("Slug exhausted"));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("term name already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: term name already exists");
    }

    #[test]
    fn test_slug_conflict_detection() {
        assert!(Error::Conflict("duplicate key sample_slug_key".to_string()).is_slug_conflict());
        assert!(!Error::Conflict("duplicate key term_name_key".to_string()).is_slug_conflict());
        assert!(!Error::NotFound("sample_slug".to_string()).is_slug_conflict());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#);
        let err: Error = json_err.unwrap_err().into();
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
