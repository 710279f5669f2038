//! Error types for the knowledge store and retrieval index

/// Result type for knowledge operations.
///
/// Convenience alias that uses [`KnowledgeError`] as the error type.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Error kinds surfaced by the store and the retrieval index.
///
/// Callers are expected to branch on the kind rather than the message:
/// a [`KnowledgeError::Validation`] means the request itself was bad and
/// nothing was written, while a [`KnowledgeError::Storage`] means the
/// database failed underneath the operation. Neither is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// A required field was empty on insert
    #[error("Invalid entry: {field} must not be empty")]
    Validation { field: &'static str },

    /// The SQLite layer failed while reading or writing
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// Filesystem errors while preparing the database location
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl KnowledgeError {
    /// Create a validation error for the named field.
    pub fn empty_field(field: &'static str) -> Self {
        Self::Validation { field }
    }

    /// Create a configuration error with a custom message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors caused by bad input rather than the medium.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// True for errors raised by the durable medium.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Io { .. })
    }
}
