//! Error types for the tabsync cache.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache has been closed.
    #[error("cache is closed")]
    CacheClosed,

    /// A keyword was empty after normalization.
    #[error("invalid keyword: {keyword:?}")]
    InvalidKeyword {
        /// The offending raw keyword.
        keyword: String,
    },

    /// A pair map insert collided on an existing key.
    #[error("pair conflict: {message}")]
    PairConflict {
        /// Description of the colliding pair.
        message: String,
    },

    /// The primary store and a secondary index disagree.
    ///
    /// This is an unrecoverable internal bug, never an expected runtime
    /// condition. Callers should treat it as fatal.
    #[error("index corruption: {message}")]
    IndexCorruption {
        /// Description of the inconsistency.
        message: String,
    },
}

impl CacheError {
    /// Creates an invalid keyword error.
    pub fn invalid_keyword(keyword: impl Into<String>) -> Self {
        Self::InvalidKeyword {
            keyword: keyword.into(),
        }
    }

    /// Creates a pair conflict error.
    pub fn pair_conflict(message: impl Into<String>) -> Self {
        Self::PairConflict {
            message: message.into(),
        }
    }

    /// Creates an index corruption error.
    pub fn index_corruption(message: impl Into<String>) -> Self {
        Self::IndexCorruption {
            message: message.into(),
        }
    }
}
