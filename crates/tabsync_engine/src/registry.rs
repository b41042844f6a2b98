//! Explicit conversion registry.

use crate::descriptor::TypeDescriptor;
use crate::error::{EngineError, EngineResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tabsync_core::{CacheRecord, GraphObject, SharedObject, SyncCache};

/// A draft record produced by an inbound conversion.
///
/// Drafts carry only what the converter knows; the pass driver fills in
/// the keyword, command kind, stream, and a resolved index.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    /// The record body, without its write-command verb.
    pub payload: String,
    /// Identity override; defaults to the converted object's id.
    ///
    /// Converters emitting auxiliary bookkeeping records set a synthetic
    /// id here so the extra records are never proposed for deletion.
    pub application_id: Option<String>,
    /// Index override; defaults to the slot resolved for the identity.
    pub index: Option<tabsync_core::RecordIndex>,
}

impl RecordDraft {
    /// Creates a draft addressed by the converted object's identity.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            application_id: None,
            index: None,
        }
    }

    /// Overrides the identity the draft is recorded under.
    #[must_use]
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    /// Pins the draft to an explicit index.
    #[must_use]
    pub fn at_index(mut self, index: tabsync_core::RecordIndex) -> Self {
        self.index = Some(index);
        self
    }
}

/// Converts between graph objects and textual records for one type.
///
/// Implementations are registered alongside a [`TypeDescriptor`]; the
/// encoding of any particular record body is entirely theirs.
pub trait Converter: Send + Sync {
    /// Converts a pulled object into record drafts.
    fn to_records(&self, object: &dyn GraphObject, cache: &SyncCache) -> EngineResult<Vec<RecordDraft>>;

    /// Converts a cached record back into a graph object.
    fn to_object(&self, record: &CacheRecord, cache: &SyncCache) -> EngineResult<SharedObject>;
}

struct Registration {
    descriptor: TypeDescriptor,
    converter: Arc<dyn Converter>,
}

/// Maps entity type names to their descriptor and converter.
///
/// The registry is populated by explicit registration calls at startup
/// and validated before scheduling; nothing is discovered at runtime.
#[derive(Default)]
pub struct ConverterRegistry {
    entries: BTreeMap<String, Registration>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type name is already registered.
    pub fn register(
        &mut self,
        descriptor: TypeDescriptor,
        converter: Arc<dyn Converter>,
    ) -> EngineResult<()> {
        let type_name = descriptor.type_name().to_string();
        if self.entries.contains_key(&type_name) {
            return Err(EngineError::DuplicateType { type_name });
        }
        self.entries.insert(
            type_name,
            Registration {
                descriptor,
                converter,
            },
        );
        Ok(())
    }

    /// Validates that every declared prerequisite is registered.
    pub fn validate(&self) -> EngineResult<()> {
        for registration in self.entries.values() {
            for prerequisite in registration.descriptor.prerequisites() {
                if !self.entries.contains_key(prerequisite) {
                    return Err(EngineError::UnknownPrerequisite {
                        type_name: registration.descriptor.type_name().to_string(),
                        prerequisite: prerequisite.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the descriptor for a type.
    #[must_use]
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.entries.get(type_name).map(|r| &r.descriptor)
    }

    /// Returns the converter for a type.
    #[must_use]
    pub fn converter(&self, type_name: &str) -> Option<Arc<dyn Converter>> {
        self.entries.get(type_name).map(|r| Arc::clone(&r.converter))
    }

    /// Iterates over registered descriptors, ordered by type name.
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.entries.values().map(|r| &r.descriptor)
    }

    /// Returns the distinct keywords covered by registered types.
    #[must_use]
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .descriptors()
            .map(|d| d.keyword().to_string())
            .collect();
        keywords.sort();
        keywords.dedup();
        keywords
    }

    /// Returns the prerequisite graph over registered types.
    #[must_use]
    pub fn prerequisite_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.descriptors()
            .map(|d| (d.type_name().to_string(), d.prerequisites().to_vec()))
            .collect()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
