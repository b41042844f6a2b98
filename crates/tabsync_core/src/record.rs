//! Cache records and payload change detection.

use crate::keyword::Keyword;
use crate::object::SharedObject;
use crate::types::{AppId, RecordIndex, StreamId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How a record is addressed by the external system's write commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Addressed purely by index; deletes blank the slot in place.
    Indexed,
    /// Appended to / removed from an ordered external list; deletes shift
    /// later indices, so they must be issued in descending index order.
    Positional,
}

/// Content fingerprint of a normalized payload.
pub type Fingerprint = [u8; 32];

/// Normalizes payload text for comparison.
///
/// Runs of whitespace are insignificant in the record format, and field
/// text is case-insensitive, so the normal form case-folds and collapses
/// whitespace to single spaces.
#[must_use]
pub fn normalize_payload(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Computes the change-detection fingerprint of a payload.
#[must_use]
pub fn payload_fingerprint(raw: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(normalize_payload(raw).as_bytes());
    hasher.finalize().into()
}

/// One physical record version in the cache.
///
/// A record is created by an upsert, demoted to previous-only when a newer
/// version supersedes it (or by an explicit mark-previous), and physically
/// removed at snapshot time once it has served as a diff baseline.
#[derive(Clone)]
pub struct CacheRecord {
    keyword: Keyword,
    index: RecordIndex,
    payload: String,
    fingerprint: Fingerprint,
    application_id: Option<AppId>,
    stream_id: Option<StreamId>,
    kind: CommandKind,
    object: Option<SharedObject>,
    previous: bool,
    latest: bool,
}

impl CacheRecord {
    /// Creates a fresh record, flagged as the sole latest version.
    #[must_use]
    pub(crate) fn new(
        keyword: Keyword,
        index: RecordIndex,
        payload: String,
        application_id: Option<AppId>,
        stream_id: Option<StreamId>,
        kind: CommandKind,
    ) -> Self {
        let fingerprint = payload_fingerprint(&payload);
        Self {
            keyword,
            index,
            payload,
            fingerprint,
            application_id,
            stream_id,
            kind,
            object: None,
            previous: false,
            latest: true,
        }
    }

    /// Returns the canonical table keyword.
    #[must_use]
    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    /// Returns the positional index.
    #[must_use]
    pub fn index(&self) -> RecordIndex {
        self.index
    }

    /// Returns the record body, without its write-command verb.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the normalized-payload fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the remote identity, if any.
    #[must_use]
    pub fn application_id(&self) -> Option<&AppId> {
        self.application_id.as_ref()
    }

    /// Returns the stream the record was associated with, if any.
    #[must_use]
    pub fn stream_id(&self) -> Option<&StreamId> {
        self.stream_id.as_ref()
    }

    /// Returns how write and delete commands address this record.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Returns the attached converted object, if one has been assigned.
    #[must_use]
    pub fn object(&self) -> Option<&SharedObject> {
        self.object.as_ref()
    }

    /// Returns true if this record is a previous-generation baseline.
    #[must_use]
    pub fn is_previous(&self) -> bool {
        self.previous
    }

    /// Returns true if this record is the current accepted state of its slot.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.latest
    }

    /// Returns true if this record may be proposed for external deletion.
    ///
    /// Records carrying a synthetic application id are infrastructure the
    /// system created for its own bookkeeping and are never alterable.
    #[must_use]
    pub fn is_alterable(&self, synthetic_prefix: &str) -> bool {
        self.application_id
            .as_ref()
            .map_or(true, |id| !id.is_synthetic(synthetic_prefix))
    }

    pub(crate) fn set_latest(&mut self, latest: bool) {
        self.latest = latest;
    }

    pub(crate) fn set_previous(&mut self, previous: bool) {
        self.previous = previous;
    }

    pub(crate) fn set_application_id(&mut self, id: AppId) {
        self.application_id = Some(id);
    }

    pub(crate) fn set_stream_id(&mut self, id: StreamId) {
        self.stream_id = Some(id);
    }

    pub(crate) fn set_object(&mut self, object: SharedObject) {
        self.object = Some(object);
    }
}

impl fmt::Debug for CacheRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRecord")
            .field("keyword", &self.keyword)
            .field("index", &self.index)
            .field("application_id", &self.application_id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .field("has_object", &self.object.is_some())
            .field("previous", &self.previous)
            .field("latest", &self.latest)
            .finish()
    }
}
