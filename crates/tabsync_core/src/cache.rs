//! The synchronization cache façade.

use crate::allocator::IndexAllocator;
use crate::collection::{RecordCollection, UpsertOutcome};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::keyword::Keyword;
use crate::object::SharedObject;
use crate::record::{CacheRecord, CommandKind};
use crate::types::{AppId, RecordIndex, StreamId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Mutable cache state guarded by the façade lock.
struct Inner {
    collection: RecordCollection,
    allocator: IndexAllocator,
    open: bool,
}

/// The synchronization cache.
///
/// `SyncCache` composes the record collection and the index allocator
/// behind a single coarse lock and exposes the read/write contract used by
/// conversion code. The access pattern is read-heavy with bursts of writes
/// during a reconciliation pass, so one critical section per cache
/// instance is sufficient; the lock is held only for in-memory work, never
/// across an external call.
///
/// # Example
///
/// ```rust,ignore
/// use tabsync_core::{CacheConfig, CommandKind, RecordIndex, SyncCache};
///
/// let cache = SyncCache::new(CacheConfig::default());
/// let index = cache.resolve_index("NODE", "a1")?;
/// cache.upsert("NODE", index, "X,1,2,3", Some("a1"), Some("s1"), CommandKind::Indexed)?;
/// ```
pub struct SyncCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

impl Default for SyncCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SyncCache {
    /// Creates an empty cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                collection: RecordCollection::new(),
                allocator: IndexAllocator::new(),
                open: true,
            }),
        }
    }

    /// Returns the cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns true if the cache has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Returns the number of live records, all generations included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().collection.len()
    }

    /// Returns true if the cache holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or reconfirms a record at `(keyword, index)`.
    ///
    /// The keyword is normalized through the alias table, the application
    /// id through whitespace stripping (an empty id means no identity and
    /// is never an error). A committed upsert clears any provisional
    /// reservation for the slot.
    pub fn upsert(
        &self,
        keyword: &str,
        index: RecordIndex,
        payload: impl Into<String>,
        application_id: Option<&str>,
        stream_id: Option<&str>,
        kind: CommandKind,
    ) -> CacheResult<UpsertOutcome> {
        let keyword = self.keyword(keyword)?;
        let application_id = application_id.and_then(AppId::normalize);
        let stream_id = stream_id.map(StreamId::new);

        let mut inner = self.lock_open()?;
        let outcome = inner.collection.upsert(
            keyword.clone(),
            index,
            payload.into(),
            application_id,
            stream_id,
            kind,
        );
        inner.allocator.commit(&keyword, index);
        Ok(outcome)
    }

    /// Resolves a stable index for an entity.
    ///
    /// An index already committed for the identity wins; otherwise the
    /// allocator hands out (or idempotently repeats) a provisional index
    /// distinct from everything committed or reserved for the keyword.
    /// An empty application id always yields a brand-new index.
    pub fn resolve_index(&self, keyword: &str, application_id: &str) -> CacheResult<RecordIndex> {
        let keyword = self.keyword(keyword)?;
        let application_id = AppId::normalize(application_id);

        let mut inner = self.lock_open()?;
        if let Some(id) = &application_id {
            if let Some(index) = inner.collection.lookup_index(&keyword, id) {
                return Ok(index);
            }
        }
        Ok(inner.allocator.resolve(&keyword, application_id.as_ref()))
    }

    /// Reserves an index for an entity ahead of its upsert.
    ///
    /// Convenience alias for [`SyncCache::resolve_index`]; used to claim
    /// per-object slots before fanning conversion work out to workers.
    pub fn reserve_index(&self, keyword: &str, application_id: &str) -> CacheResult<RecordIndex> {
        self.resolve_index(keyword, application_id)
    }

    /// Marks externally-observed indices as used, without identity.
    pub fn reserve_existing<I>(&self, keyword: &str, indices: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = u32>,
    {
        let keyword = self.keyword(keyword)?;
        let mut inner = self.lock_open()?;
        inner.allocator.reserve_existing(&keyword, indices);
        Ok(())
    }

    /// Captures the current used-index sets as the allocation baseline.
    pub fn baseline(&self) -> CacheResult<()> {
        let mut inner = self.lock_open()?;
        inner.allocator.baseline();
        Ok(())
    }

    /// Restores the allocation baseline and drops provisional reservations.
    ///
    /// Externally pre-existing indices are never reused, even after a full
    /// reset.
    pub fn reset_to_baseline(&self) -> CacheResult<()> {
        let mut inner = self.lock_open()?;
        inner.allocator.reset_to_baseline();
        Ok(())
    }

    /// Looks up the index recorded for an identity.
    pub fn lookup_index(
        &self,
        keyword: &str,
        application_id: &str,
    ) -> CacheResult<Option<RecordIndex>> {
        let keyword = self.keyword(keyword)?;
        let inner = self.lock_open()?;
        Ok(AppId::normalize(application_id)
            .and_then(|id| inner.collection.lookup_index(&keyword, &id)))
    }

    /// Looks up indices for a batch of identities.
    ///
    /// The result preserves the input cardinality, with `None` gaps for
    /// unmatched or empty ids.
    pub fn lookup_indices(
        &self,
        keyword: &str,
        application_ids: &[&str],
    ) -> CacheResult<Vec<Option<RecordIndex>>> {
        let keyword = self.keyword(keyword)?;
        let inner = self.lock_open()?;
        Ok(application_ids
            .iter()
            .map(|raw| {
                AppId::normalize(raw).and_then(|id| inner.collection.lookup_index(&keyword, &id))
            })
            .collect())
    }

    /// Returns true if the identity has any record under the keyword.
    pub fn application_id_exists(&self, keyword: &str, application_id: &str) -> CacheResult<bool> {
        let keyword = self.keyword(keyword)?;
        let inner = self.lock_open()?;
        Ok(AppId::normalize(application_id)
            .is_some_and(|id| inner.collection.contains_application_id(&keyword, &id)))
    }

    /// Returns true if any record carries an object of the domain type.
    pub fn contains_type(&self, type_name: &str) -> CacheResult<bool> {
        let inner = self.lock_open()?;
        Ok(inner.collection.contains_type(type_name))
    }

    /// Returns every attached object of a domain type.
    pub fn objects_of_type(&self, type_name: &str) -> CacheResult<Vec<SharedObject>> {
        let inner = self.lock_open()?;
        Ok(inner.collection.objects_of_type(type_name))
    }

    /// Attaches a converted object to the record matching the identity.
    pub fn attach_object(
        &self,
        keyword: &str,
        application_id: &str,
        object: SharedObject,
        stream_id: Option<&str>,
    ) -> CacheResult<bool> {
        let keyword = self.keyword(keyword)?;
        let Some(id) = AppId::normalize(application_id) else {
            return Ok(false);
        };
        let stream_id = stream_id.map(StreamId::new);
        let mut inner = self.lock_open()?;
        Ok(inner
            .collection
            .attach_object(&keyword, &id, object, stream_id.as_ref()))
    }

    /// Demotes the latest record(s) for an identity to previous-only.
    pub fn mark_previous(&self, keyword: &str, application_id: &str) -> CacheResult<()> {
        let keyword = self.keyword(keyword)?;
        if let Some(id) = AppId::normalize(application_id) {
            let mut inner = self.lock_open()?;
            inner.collection.mark_previous(&keyword, &id);
        }
        Ok(())
    }

    /// Rolls the generation window forward for one stream.
    ///
    /// Returns the number of records evicted from the cache.
    pub fn snapshot(&self, stream_id: &str) -> CacheResult<usize> {
        let stream = StreamId::new(stream_id);
        let mut inner = self.lock_open()?;
        let evicted = inner
            .collection
            .snapshot(&stream, &self.config.synthetic_prefix)?;
        info!(stream = %stream, evicted, "snapshot rolled generation window");
        Ok(evicted)
    }

    /// Returns superseded records awaiting external deletion.
    pub fn expired_records(&self) -> CacheResult<Vec<CacheRecord>> {
        let inner = self.lock_open()?;
        Ok(inner
            .collection
            .expired_records(&self.config.synthetic_prefix))
    }

    /// Returns every latest alterable record, for a full external wipe.
    pub fn deletable_records(&self) -> CacheResult<Vec<CacheRecord>> {
        let inner = self.lock_open()?;
        Ok(inner
            .collection
            .deletable_records(&self.config.synthetic_prefix))
    }

    /// Returns the write command text for every record written this pass.
    pub fn new_write_commands(&self) -> CacheResult<BTreeMap<Keyword, Vec<String>>> {
        let inner = self.lock_open()?;
        Ok(inner.collection.new_write_commands())
    }

    /// Returns every latest record under a keyword, ordered by index.
    pub fn latest_records(&self, keyword: &str) -> CacheResult<Vec<CacheRecord>> {
        let keyword = self.keyword(keyword)?;
        let inner = self.lock_open()?;
        Ok(inner.collection.latest_records(&keyword))
    }

    /// Returns the latest record at a slot, if any.
    pub fn record_at(&self, keyword: &str, index: RecordIndex) -> CacheResult<Option<CacheRecord>> {
        let keyword = self.keyword(keyword)?;
        let inner = self.lock_open()?;
        Ok(inner.collection.record_at(&keyword, index).cloned())
    }

    /// Generates a fresh synthetic application id under the configured
    /// prefix.
    #[must_use]
    pub fn synthetic_application_id(&self) -> AppId {
        AppId::synthetic(&self.config.synthetic_prefix)
    }

    /// Removes every record and all allocation state. The cache stays
    /// open.
    pub fn clear(&self) -> CacheResult<()> {
        let mut inner = self.lock_open()?;
        inner.collection.clear();
        inner.allocator.clear();
        debug!("cache cleared");
        Ok(())
    }

    /// Closes the cache and drops its contents.
    ///
    /// Every subsequent operation fails with [`CacheError::CacheClosed`].
    /// Closing an already-closed cache is a no-op.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.open {
            inner.collection.clear();
            inner.allocator.clear();
            inner.open = false;
            debug!("cache closed");
        }
    }

    fn keyword(&self, raw: &str) -> CacheResult<Keyword> {
        Keyword::canonical(raw, &self.config.aliases)
            .ok_or_else(|| CacheError::invalid_keyword(raw))
    }

    fn lock_open(&self) -> CacheResult<MutexGuard<'_, Inner>> {
        let inner = self.inner.lock();
        if inner.open {
            Ok(inner)
        } else {
            Err(CacheError::CacheClosed)
        }
    }
}
