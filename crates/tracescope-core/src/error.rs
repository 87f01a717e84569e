//! Error types for TraceScope

use thiserror::Error;

/// Result type alias using TraceScope's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TraceScope operations
///
/// Only the data-source boundary and configuration loading produce these.
/// Normalization, hierarchy, layout and aggregation are total and degrade to
/// defaults instead of failing.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedded snapshot query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// REST API error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// Data source returned something unusable
    #[error("Source error: {0}")]
    Source(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Transport and IO failures are retryable; a missing trace or a
    /// malformed document is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode() && !e.is_builder(),
            Self::Database(sqlx::Error::RowNotFound) => false,
            Self::Database(_) | Self::Io(_) => true,
            Self::Config(_) | Self::NotFound { .. } | Self::Source(_) | Self::Serialization(_) => {
                false
            }
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("trace", "abc123");
        assert_eq!(err.to_string(), "trace not found: abc123");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_io_is_retryable() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_retryable());
    }
}
