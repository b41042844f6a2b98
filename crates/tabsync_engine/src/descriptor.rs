//! Typed conversion descriptors.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tabsync_core::CommandKind;

/// Immutable metadata describing one convertible entity type.
///
/// Descriptors are built explicitly at startup and validated when they
/// are constructed and registered; there is no runtime discovery of
/// conversion metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    type_name: String,
    keyword: String,
    kind: CommandKind,
    prerequisites: Vec<String>,
    parallel: bool,
}

impl TypeDescriptor {
    /// Creates a descriptor with no prerequisites.
    ///
    /// # Errors
    ///
    /// Returns an error if the type name or keyword is empty.
    pub fn new(
        type_name: impl Into<String>,
        keyword: impl Into<String>,
        kind: CommandKind,
    ) -> EngineResult<Self> {
        let type_name = type_name.into();
        let keyword = keyword.into();
        if type_name.trim().is_empty() {
            return Err(EngineError::invalid_descriptor("type name is empty"));
        }
        if keyword.trim().is_empty() {
            return Err(EngineError::invalid_descriptor(format!(
                "keyword is empty for type {type_name}"
            )));
        }
        Ok(Self {
            type_name,
            keyword,
            kind,
            prerequisites: Vec::new(),
            parallel: false,
        })
    }

    /// Declares prerequisite types that must be processed first.
    ///
    /// # Errors
    ///
    /// Returns an error if a type lists itself as a prerequisite.
    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        if self.prerequisites.iter().any(|p| *p == self.type_name) {
            return Err(EngineError::invalid_descriptor(format!(
                "type {} lists itself as a prerequisite",
                self.type_name
            )));
        }
        Ok(self)
    }

    /// Flags per-object processing as independently parallelizable.
    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the table keyword this type's records live under.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Returns how records of this type are addressed.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Returns the prerequisite type names.
    #[must_use]
    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    /// Returns true if per-object work may fan out within a tier.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}
