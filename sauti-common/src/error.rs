//! Error types for the Sauti services.

use thiserror::Error;

/// Result type alias using the Sauti error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Sauti services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request (e.g. a malformed alert rule)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The feedback snapshot provider or backing store could not be reached
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A notification channel could not be reached
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an `anyhow` storage failure, keeping the full cause chain in the message.
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    /// Check if this is a client-side input error.
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Notification(_) => "NOTIFICATION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::WithContext { source, .. } => source.code(),
            _ => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::SourceUnavailable(_) | Self::Notification(_) => 502,
            Self::Timeout => 408,
            Self::WithContext { source, .. } => source.status_code(),
            _ => 500,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::NotFound("rule".into()).status_code(), 404);
        assert_eq!(Error::InvalidInput("name".into()).status_code(), 400);
        assert_eq!(Error::SourceUnavailable("db".into()).status_code(), 502);
        assert_eq!(Error::Storage("locked".into()).status_code(), 500);
        assert_eq!(Error::Timeout.status_code(), 408);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::InvalidInput("min_count must be >= 1".into());
        let with_ctx = err.with_context("creating rule");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert_eq!(with_ctx.status_code(), 400);
        assert_eq!(with_ctx.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_storage_keeps_cause_chain() {
        let err = anyhow::anyhow!("disk full").context("inserting alerts");
        let wrapped = Error::storage(err);
        assert!(wrapped.to_string().contains("inserting alerts"));
        assert!(wrapped.to_string().contains("disk full"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.context("reading runtime.json").unwrap_err();
        assert!(err.to_string().starts_with("reading runtime.json"));
    }
}
