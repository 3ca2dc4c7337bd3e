//! Error types for the metadata layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::BackendError;

/// Metadata operation result type.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Coarse classification of a [`MetadataError`].
///
/// Recovery paths branch on this instead of on the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The database could not describe the object.
    Introspection,
    /// A cache entry could not be written.
    CacheWrite,
    /// A cache entry could not be read.
    CacheRead,
    /// A cache entry was read but is not a valid result set.
    Parse,
    /// The configuration handed to the helper is unusable.
    Config,
    /// An object name could not be parsed.
    InvalidName,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Introspection => "introspection",
            ErrorKind::CacheWrite => "cache_write",
            ErrorKind::CacheRead => "cache_read",
            ErrorKind::Parse => "parse",
            ErrorKind::Config => "config",
            ErrorKind::InvalidName => "invalid_name",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata errors.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Session error (connection, query, row shape)
    #[error("Database error: {0}")]
    Backend(#[from] BackendError),

    /// Cache directory or file could not be written
    #[error("Could not write cache file {}: {source}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache file could not be read
    #[error("Could not read cache file {}: {source}", path.display())]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache file content is not a serialized result set
    #[error("Malformed cache file {}: {source}", path.display())]
    CacheParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Result set could not be serialized for the cache
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object name could not be parsed
    #[error("Invalid object name '{input}': {reason}")]
    InvalidName { input: String, reason: String },
}

impl MetadataError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid name error.
    pub fn invalid_name(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetadataError::Backend(_) => ErrorKind::Introspection,
            MetadataError::CacheWrite { .. } | MetadataError::Serialization(_) => {
                ErrorKind::CacheWrite
            }
            MetadataError::CacheRead { .. } => ErrorKind::CacheRead,
            MetadataError::CacheParse { .. } => ErrorKind::Parse,
            MetadataError::Config(_) => ErrorKind::Config,
            MetadataError::InvalidName { .. } => ErrorKind::InvalidName,
        }
    }

    /// True when a cache file simply does not exist yet.
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            MetadataError::CacheRead { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
