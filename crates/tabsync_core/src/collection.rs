//! The multi-index record store.

use crate::error::{CacheError, CacheResult};
use crate::keyword::Keyword;
use crate::object::SharedObject;
use crate::record::{payload_fingerprint, CacheRecord, CommandKind};
use crate::types::{AppId, RecordIndex, StreamId};
use crate::wire;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed at the slot; a fresh one was inserted.
    Inserted,
    /// An existing record carried the same payload; its latest flag was
    /// reconfirmed and no new record was created.
    Unchanged,
    /// The payload changed; existing records were demoted to previous and
    /// a new sole-latest record was inserted.
    Superseded,
}

/// The core multi-index store of cache records.
///
/// One record exists per `(keyword, index, generation)`. Secondary indices
/// cover lookups by keyword, by application id, by source stream, and by
/// attached-object type name.
///
/// Every mutation flows through the private [`RecordCollection::insert_record`]
/// and [`RecordCollection::evict`] methods, which update the primary slab
/// and every secondary index together. Call sites never touch an index
/// directly, so a partial update cannot occur by construction; a mismatch
/// detected during eviction is reported as [`CacheError::IndexCorruption`].
#[derive(Default)]
pub struct RecordCollection {
    /// Primary slab. `None` slots are free for reuse.
    records: Vec<Option<CacheRecord>>,
    /// Free slab positions.
    free: Vec<usize>,
    /// Live record count.
    live: usize,
    /// Record generations at each `(keyword, index)` slot.
    by_slot: HashMap<(Keyword, u32), Vec<usize>>,
    /// All records under a keyword.
    by_keyword: HashMap<Keyword, HashSet<usize>>,
    /// Record chain for each remote identity.
    by_app: HashMap<(Keyword, AppId), HashSet<usize>>,
    /// Records associated with a stream.
    by_stream: HashMap<StreamId, HashSet<usize>>,
    /// Records with an attached object, by domain type name.
    by_type: HashMap<String, HashSet<usize>>,
}

impl RecordCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live records, all generations included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Inserts or reconfirms a record at `(keyword, index)`.
    ///
    /// Payloads are compared by normalized fingerprint. An identical
    /// payload reconfirms the existing record as latest (demoting any
    /// sibling generation at the slot) and backfills a missing identity;
    /// a changed payload demotes every existing generation and inserts the
    /// new record as the sole latest. Demoted records remain queryable as
    /// history until the next snapshot.
    pub fn upsert(
        &mut self,
        keyword: Keyword,
        index: RecordIndex,
        payload: String,
        application_id: Option<AppId>,
        stream_id: Option<StreamId>,
        kind: CommandKind,
    ) -> UpsertOutcome {
        let slot = (keyword.clone(), index.as_u32());
        let positions = self.by_slot.get(&slot).cloned().unwrap_or_default();

        if positions.is_empty() {
            self.insert_record(CacheRecord::new(
                keyword,
                index,
                payload,
                application_id,
                stream_id,
                kind,
            ));
            return UpsertOutcome::Inserted;
        }

        let fingerprint = payload_fingerprint(&payload);
        let matching = positions
            .iter()
            .copied()
            .find(|&pos| self.record(pos).is_some_and(|r| *r.fingerprint() == fingerprint));

        if let Some(pos) = matching {
            for other in positions.iter().copied().filter(|&p| p != pos) {
                self.demote(other);
            }
            if let Some(record) = self.records[pos].as_mut() {
                record.set_latest(true);
            }
            if let Some(id) = application_id {
                self.backfill_application_id(pos, id);
            }
            if let Some(stream) = stream_id {
                self.backfill_stream_id(pos, stream);
            }
            return UpsertOutcome::Unchanged;
        }

        debug!(keyword = %keyword, index = %index, "record superseded");
        for pos in positions {
            self.demote(pos);
        }
        self.insert_record(CacheRecord::new(
            keyword,
            index,
            payload,
            application_id,
            stream_id,
            kind,
        ));
        UpsertOutcome::Superseded
    }

    /// Attaches a converted object to the record matching the identity.
    ///
    /// The object lands on the record for `(keyword, application id)` that
    /// does not already carry one, optionally restricted to one stream.
    /// Returns true if a record accepted the object.
    pub fn attach_object(
        &mut self,
        keyword: &Keyword,
        application_id: &AppId,
        object: SharedObject,
        stream_id: Option<&StreamId>,
    ) -> bool {
        let key = (keyword.clone(), application_id.clone());
        let candidate = self.by_app.get(&key).and_then(|positions| {
            positions
                .iter()
                .copied()
                .find(|&pos| {
                    self.record(pos).is_some_and(|r| {
                        r.object().is_none()
                            && stream_id.is_none_or(|wanted| r.stream_id() == Some(wanted))
                    })
                })
        });

        let Some(pos) = candidate else {
            return false;
        };
        self.by_type
            .entry(object.type_name().to_string())
            .or_default()
            .insert(pos);
        if let Some(record) = self.records[pos].as_mut() {
            record.set_object(object);
        }
        true
    }

    /// Demotes the latest record(s) for an identity to previous-only.
    ///
    /// Used when a remote update supersedes an entity but local
    /// re-serialization is impossible; the previous state is all there is
    /// to diff against.
    pub fn mark_previous(&mut self, keyword: &Keyword, application_id: &AppId) {
        let key = (keyword.clone(), application_id.clone());
        let positions: Vec<usize> = self
            .by_app
            .get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for pos in positions {
            self.demote(pos);
        }
    }

    /// Rolls the generation window forward for one stream.
    ///
    /// Alterable records that are no longer latest have fully served as a
    /// diff baseline and are physically removed; surviving latest records
    /// are demoted to the new previous baseline. Non-alterable records are
    /// left untouched. Returns the number of evicted records.
    pub fn snapshot(&mut self, stream_id: &StreamId, synthetic_prefix: &str) -> CacheResult<usize> {
        let positions: Vec<usize> = self
            .by_stream
            .get(stream_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut evicted = 0;
        for pos in positions {
            let Some(record) = self.record(pos) else {
                continue;
            };
            if !record.is_alterable(synthetic_prefix) {
                continue;
            }
            if record.is_latest() {
                if let Some(record) = self.records[pos].as_mut() {
                    record.set_previous(true);
                }
            } else {
                self.evict(pos)?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Returns superseded records that must be deleted externally.
    ///
    /// These are previous-and-not-latest alterable records: a newer
    /// version has replaced each of them. Ordered by descending index
    /// within each keyword so positional deletes never shift an index
    /// that a later delete still refers to.
    #[must_use]
    pub fn expired_records(&self, synthetic_prefix: &str) -> Vec<CacheRecord> {
        self.select_descending(|r| {
            r.is_previous() && !r.is_latest() && r.is_alterable(synthetic_prefix)
        })
    }

    /// Returns every latest alterable record.
    ///
    /// The candidate set for wiping everything this system has written.
    /// Ordered like [`RecordCollection::expired_records`].
    #[must_use]
    pub fn deletable_records(&self, synthetic_prefix: &str) -> Vec<CacheRecord> {
        self.select_descending(|r| r.is_latest() && r.is_alterable(synthetic_prefix))
    }

    /// Returns the write command text for every record written this pass.
    ///
    /// Per keyword, every current-latest record that is not part of the
    /// previous baseline: unchanged records already exist externally and
    /// need no write-back.
    #[must_use]
    pub fn new_write_commands(&self) -> BTreeMap<Keyword, Vec<String>> {
        let mut out: BTreeMap<Keyword, Vec<CacheRecord>> = BTreeMap::new();
        for record in self.live_records() {
            if record.is_latest() && !record.is_previous() {
                out.entry(record.keyword().clone())
                    .or_default()
                    .push(record.clone());
            }
        }
        out.into_iter()
            .map(|(keyword, mut records)| {
                records.sort_by_key(CacheRecord::index);
                let commands = records.iter().map(wire::write_command).collect();
                (keyword, commands)
            })
            .collect()
    }

    /// Returns the latest record at a slot, if any.
    #[must_use]
    pub fn record_at(&self, keyword: &Keyword, index: RecordIndex) -> Option<&CacheRecord> {
        let slot = (keyword.clone(), index.as_u32());
        self.by_slot.get(&slot).and_then(|positions| {
            positions
                .iter()
                .filter_map(|&pos| self.record(pos))
                .find(|r| r.is_latest())
        })
    }

    /// Returns every latest record under a keyword, ordered by index.
    #[must_use]
    pub fn latest_records(&self, keyword: &Keyword) -> Vec<CacheRecord> {
        let mut records: Vec<CacheRecord> = self
            .by_keyword
            .get(keyword)
            .into_iter()
            .flatten()
            .filter_map(|&pos| self.record(pos))
            .filter(|r| r.is_latest())
            .cloned()
            .collect();
        records.sort_by_key(CacheRecord::index);
        records
    }

    /// Looks up the index recorded for an identity.
    #[must_use]
    pub fn lookup_index(&self, keyword: &Keyword, application_id: &AppId) -> Option<RecordIndex> {
        let key = (keyword.clone(), application_id.clone());
        let positions = self.by_app.get(&key)?;
        let records: Vec<&CacheRecord> =
            positions.iter().filter_map(|&pos| self.record(pos)).collect();
        records
            .iter()
            .find(|r| r.is_latest())
            .or_else(|| records.first())
            .map(|r| r.index())
    }

    /// Looks up indices for a batch of identities.
    ///
    /// The result preserves the input cardinality, with `None` gaps for
    /// unmatched ids.
    #[must_use]
    pub fn lookup_indices(
        &self,
        keyword: &Keyword,
        application_ids: &[AppId],
    ) -> Vec<Option<RecordIndex>> {
        application_ids
            .iter()
            .map(|id| self.lookup_index(keyword, id))
            .collect()
    }

    /// Returns true if the identity has any record under the keyword.
    #[must_use]
    pub fn contains_application_id(&self, keyword: &Keyword, application_id: &AppId) -> bool {
        let key = (keyword.clone(), application_id.clone());
        self.by_app.get(&key).is_some_and(|set| !set.is_empty())
    }

    /// Returns every attached object of a domain type.
    #[must_use]
    pub fn objects_of_type(&self, type_name: &str) -> Vec<SharedObject> {
        self.by_type
            .get(type_name)
            .into_iter()
            .flatten()
            .filter_map(|&pos| self.record(pos))
            .filter_map(|r| r.object().cloned())
            .collect()
    }

    /// Returns true if any record carries an object of the type.
    #[must_use]
    pub fn contains_type(&self, type_name: &str) -> bool {
        self.by_type.get(type_name).is_some_and(|set| !set.is_empty())
    }

    /// Removes every record and index entry.
    pub fn clear(&mut self) {
        self.records.clear();
        self.free.clear();
        self.live = 0;
        self.by_slot.clear();
        self.by_keyword.clear();
        self.by_app.clear();
        self.by_stream.clear();
        self.by_type.clear();
    }

    fn record(&self, pos: usize) -> Option<&CacheRecord> {
        self.records.get(pos).and_then(Option::as_ref)
    }

    fn live_records(&self) -> impl Iterator<Item = &CacheRecord> {
        self.records.iter().filter_map(Option::as_ref)
    }

    fn select_descending(&self, pred: impl Fn(&CacheRecord) -> bool) -> Vec<CacheRecord> {
        let mut selected: Vec<CacheRecord> =
            self.live_records().filter(|&r| pred(r)).cloned().collect();
        selected.sort_by(|a, b| {
            a.keyword()
                .cmp(b.keyword())
                .then(b.index().cmp(&a.index()))
        });
        selected
    }

    fn demote(&mut self, pos: usize) {
        if let Some(record) = self.records.get_mut(pos).and_then(Option::as_mut) {
            if record.is_latest() {
                record.set_latest(false);
            }
            record.set_previous(true);
        }
    }

    fn backfill_application_id(&mut self, pos: usize, id: AppId) {
        let Some(record) = self.records.get_mut(pos).and_then(Option::as_mut) else {
            return;
        };
        if record.application_id().is_some() {
            return;
        }
        let keyword = record.keyword().clone();
        record.set_application_id(id.clone());
        self.by_app.entry((keyword, id)).or_default().insert(pos);
    }

    fn backfill_stream_id(&mut self, pos: usize, id: StreamId) {
        let Some(record) = self.records.get_mut(pos).and_then(Option::as_mut) else {
            return;
        };
        if record.stream_id().is_some() {
            return;
        }
        record.set_stream_id(id.clone());
        self.by_stream.entry(id).or_default().insert(pos);
    }

    /// Inserts a record into the slab and every secondary index.
    fn insert_record(&mut self, record: CacheRecord) -> usize {
        let keyword = record.keyword().clone();
        let index = record.index().as_u32();
        let application_id = record.application_id().cloned();
        let stream_id = record.stream_id().cloned();

        let pos = match self.free.pop() {
            Some(pos) => {
                self.records[pos] = Some(record);
                pos
            }
            None => {
                self.records.push(Some(record));
                self.records.len() - 1
            }
        };
        self.live += 1;

        self.by_slot
            .entry((keyword.clone(), index))
            .or_default()
            .push(pos);
        self.by_keyword.entry(keyword.clone()).or_default().insert(pos);
        if let Some(id) = application_id {
            self.by_app.entry((keyword, id)).or_default().insert(pos);
        }
        if let Some(stream) = stream_id {
            self.by_stream.entry(stream).or_default().insert(pos);
        }
        pos
    }

    /// Removes a record from the slab and every secondary index.
    fn evict(&mut self, pos: usize) -> CacheResult<CacheRecord> {
        let record = self.records[pos].take().ok_or_else(|| {
            CacheError::index_corruption(format!("evicting empty slab position {pos}"))
        })?;
        self.live -= 1;
        self.free.push(pos);

        let slot = (record.keyword().clone(), record.index().as_u32());
        let entry = self.by_slot.get_mut(&slot).ok_or_else(|| {
            CacheError::index_corruption(format!("slot index missing for {slot:?}"))
        })?;
        entry.retain(|&p| p != pos);
        if entry.is_empty() {
            self.by_slot.remove(&slot);
        }

        Self::remove_from(&mut self.by_keyword, record.keyword().clone(), pos).map_err(|()| {
            CacheError::index_corruption(format!(
                "keyword index missing entry for {}",
                record.keyword()
            ))
        })?;
        if let Some(id) = record.application_id() {
            let key = (record.keyword().clone(), id.clone());
            Self::remove_from(&mut self.by_app, key, pos).map_err(|()| {
                CacheError::index_corruption(format!("identity index missing entry for {id}"))
            })?;
        }
        if let Some(stream) = record.stream_id() {
            Self::remove_from(&mut self.by_stream, stream.clone(), pos).map_err(|()| {
                CacheError::index_corruption(format!("stream index missing entry for {stream}"))
            })?;
        }
        if let Some(object) = record.object() {
            Self::remove_from(&mut self.by_type, object.type_name().to_string(), pos).map_err(
                |()| {
                    CacheError::index_corruption(format!(
                        "type index missing entry for {}",
                        object.type_name()
                    ))
                },
            )?;
        }
        Ok(record)
    }

    fn remove_from<K: std::hash::Hash + Eq>(
        index: &mut HashMap<K, HashSet<usize>>,
        key: K,
        pos: usize,
    ) -> Result<(), ()> {
        let set = index.get_mut(&key).ok_or(())?;
        if !set.remove(&pos) {
            return Err(());
        }
        if set.is_empty() {
            index.remove(&key);
        }
        Ok(())
    }
}
