//! Error types for the tabsync engine.

use tabsync_core::CacheError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while driving conversion passes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cache operation failed.
    ///
    /// Cache errors indicate internal bugs or use-after-close, never a
    /// bad object; they abort the pass rather than being aggregated.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The prerequisite graph cannot be scheduled.
    ///
    /// The ready tier came up empty while types remained unprocessed,
    /// which means the prerequisite declarations are cyclic or otherwise
    /// unsatisfiable. This is a configuration error and aborts the pass.
    #[error("unsatisfiable prerequisite graph, stuck types: {stuck:?}")]
    CyclicDependencies {
        /// Types that can never become ready, sorted by name.
        stuck: Vec<String>,
    },

    /// A type was registered twice.
    #[error("type already registered: {type_name}")]
    DuplicateType {
        /// The colliding type name.
        type_name: String,
    },

    /// A type name was not found in the registry.
    #[error("unknown type: {type_name}")]
    UnknownType {
        /// The missing type name.
        type_name: String,
    },

    /// A descriptor names a prerequisite that is not registered.
    #[error("type {type_name} requires unknown prerequisite {prerequisite}")]
    UnknownPrerequisite {
        /// The declaring type.
        type_name: String,
        /// The missing prerequisite.
        prerequisite: String,
    },

    /// A descriptor failed validation.
    #[error("invalid descriptor: {message}")]
    InvalidDescriptor {
        /// Description of the problem.
        message: String,
    },

    /// A single object failed to convert.
    ///
    /// Caught per object and aggregated into the pass report; never
    /// aborts the batch.
    #[error("conversion failed for {type_name} ({application_id:?}): {message}")]
    Conversion {
        /// The entity type being converted.
        type_name: String,
        /// The object's identity, if it had one.
        application_id: Option<String>,
        /// Description of the failure.
        message: String,
    },

    /// An external client call failed.
    #[error("client error: {message}")]
    Client {
        /// Description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Creates a per-object conversion error.
    pub fn conversion(
        type_name: impl Into<String>,
        application_id: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            application_id: application_id.map(str::to_string),
            message: message.into(),
        }
    }

    /// Creates a client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }
}
