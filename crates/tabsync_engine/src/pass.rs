//! Reconciliation pass drivers.

use crate::client::{GraphClient, TabularClient};
use crate::descriptor::TypeDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::registry::{Converter, ConverterRegistry, RecordDraft};
use crate::scheduler::BatchScheduler;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabsync_core::{wire, RecordIndex, SharedObject, SyncCache, UpsertOutcome};
use tracing::{debug, info, warn};

/// Configuration for pass execution.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for intra-tier fan-out.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker thread count.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Aggregated outcome of one reconciliation pass.
///
/// Per-object conversion failures are recovered and counted here rather
/// than raised individually; a partial pass still commits the work that
/// succeeded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Objects pulled from the remote store.
    pub pulled: usize,
    /// Objects pushed to the remote store.
    pub pushed: usize,
    /// Records inserted or superseded in the cache.
    pub upserted: usize,
    /// Upserts that matched an existing record unchanged.
    pub unchanged: usize,
    /// Records converted into outbound objects.
    pub converted: usize,
    /// Objects excluded because their conversion failed.
    pub failed: usize,
    /// Objects skipped because their type is not registered.
    pub skipped: usize,
    /// Write commands issued to the external system.
    pub written: usize,
    /// Delete commands issued to the external system.
    pub deleted: usize,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
    /// One message per recovered failure.
    pub errors: Vec<String>,
}

/// Drives reconciliation passes over the cache.
///
/// A pass bulk-queries the external system into the cache, then converts
/// between the remote object graph and the cached records in dependency
/// tier order. Tiers run strictly in sequence; within a tier, types
/// flagged parallelizable fan per-object work out over worker threads,
/// with every object's index resolved before any conversion writes begin
/// so concurrent writers never race on a slot.
pub struct ReconcilePass {
    cache: Arc<SyncCache>,
    registry: Arc<ConverterRegistry>,
    tabular: Arc<dyn TabularClient>,
    graph: Arc<dyn GraphClient>,
    config: EngineConfig,
}

impl ReconcilePass {
    /// Creates a pass driver.
    pub fn new(
        cache: Arc<SyncCache>,
        registry: Arc<ConverterRegistry>,
        tabular: Arc<dyn TabularClient>,
        graph: Arc<dyn GraphClient>,
    ) -> Self {
        Self {
            cache,
            registry,
            tabular,
            graph,
            config: EngineConfig::default(),
        }
    }

    /// Overrides the pass configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the cache this driver feeds.
    #[must_use]
    pub fn cache(&self) -> &Arc<SyncCache> {
        &self.cache
    }

    /// Pulls a stream and reconciles it into the external system.
    ///
    /// Bulk-reads the external tables, pulls the stream's objects,
    /// converts them tier by tier, writes back every new record, deletes
    /// superseded ones in descending index order, and rolls the snapshot
    /// forward.
    pub fn receive(&self, stream_id: &str) -> EngineResult<PassReport> {
        let started = Instant::now();
        let scheduler = BatchScheduler::from_registry(&self.registry)?;
        let mut report = PassReport::default();

        self.ingest(&mut report)?;

        let objects = self.graph.pull(stream_id)?;
        report.pulled = objects.len();

        let mut by_type: HashMap<String, Vec<SharedObject>> = HashMap::new();
        for object in objects {
            by_type
                .entry(object.type_name().to_string())
                .or_default()
                .push(object);
        }
        let unregistered: Vec<String> = by_type
            .keys()
            .filter(|type_name| self.registry.descriptor(type_name).is_none())
            .cloned()
            .collect();
        for type_name in unregistered {
            let dropped = by_type.remove(&type_name).map_or(0, |batch| batch.len());
            report.skipped += dropped;
            warn!(type_name = %type_name, dropped, "skipping objects of unregistered type");
        }

        for tier in scheduler.tiers() {
            for type_name in tier {
                let Some(batch) = by_type.remove(type_name) else {
                    continue;
                };
                self.receive_batch(stream_id, type_name, &batch, &mut report)?;
            }
        }

        for (keyword, commands) in self.cache.new_write_commands()? {
            debug!(keyword = %keyword, count = commands.len(), "writing records");
            for command in commands {
                self.tabular.execute(&command)?;
                report.written += 1;
            }
        }
        for record in self.cache.expired_records()? {
            self.tabular.execute(&wire::delete_command(&record))?;
            report.deleted += 1;
        }
        self.cache.snapshot(stream_id)?;

        report.duration = started.elapsed();
        info!(
            stream = stream_id,
            pulled = report.pulled,
            upserted = report.upserted,
            unchanged = report.unchanged,
            failed = report.failed,
            written = report.written,
            deleted = report.deleted,
            "receive pass complete"
        );
        Ok(report)
    }

    /// Converts the external tables into objects and pushes them.
    ///
    /// Bulk-reads every registered keyword into the cache, converts the
    /// latest records tier by tier, attaches the produced objects for
    /// later merge-on-reception, and pushes them to the stream.
    pub fn send(&self, stream_id: &str) -> EngineResult<PassReport> {
        let started = Instant::now();
        let scheduler = BatchScheduler::from_registry(&self.registry)?;
        let mut report = PassReport::default();

        self.ingest(&mut report)?;

        let mut outbound: Vec<SharedObject> = Vec::new();
        let mut seen_keywords: BTreeSet<String> = BTreeSet::new();
        for tier in scheduler.tiers() {
            for type_name in tier {
                let descriptor = self.descriptor(type_name)?.clone();
                if !seen_keywords.insert(descriptor.keyword().to_string()) {
                    // another type already converted this table
                    continue;
                }
                let objects = self.send_batch(stream_id, &descriptor, &mut report)?;
                outbound.extend(objects);
            }
        }

        report.pushed = outbound.len();
        self.graph.push(stream_id, outbound)?;

        report.duration = started.elapsed();
        info!(
            stream = stream_id,
            pushed = report.pushed,
            converted = report.converted,
            failed = report.failed,
            "send pass complete"
        );
        Ok(report)
    }

    /// Deletes everything this system has written and clears the cache.
    pub fn wipe(&self) -> EngineResult<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::default();
        for record in self.cache.deletable_records()? {
            self.tabular.execute(&wire::delete_command(&record))?;
            report.deleted += 1;
        }
        self.cache.clear()?;
        report.duration = started.elapsed();
        info!(deleted = report.deleted, "wipe complete");
        Ok(report)
    }

    /// Bulk-reads every registered table into the cache and primes the
    /// allocator against externally claimed indices.
    fn ingest(&self, report: &mut PassReport) -> EngineResult<()> {
        for keyword in self.registry.keywords() {
            let lines = self.tabular.bulk_read(&keyword)?;
            for line in &lines {
                let Some(parsed) = wire::parse_line(line) else {
                    debug!(keyword = %keyword, line = %line, "skipping non-record line");
                    continue;
                };
                let outcome = self.cache.upsert(
                    &parsed.field.keyword,
                    RecordIndex::new(parsed.index),
                    parsed.payload,
                    parsed.field.application_id.as_deref(),
                    parsed.field.stream_id.as_deref(),
                    parsed.kind,
                )?;
                match outcome {
                    UpsertOutcome::Unchanged => report.unchanged += 1,
                    _ => report.upserted += 1,
                }
            }
            let highest = self.tabular.highest_index(&keyword)?;
            if highest > 0 {
                self.cache.reserve_existing(&keyword, 1..=highest)?;
            }
        }
        self.cache.baseline()?;
        Ok(())
    }

    fn receive_batch(
        &self,
        stream_id: &str,
        type_name: &str,
        batch: &[SharedObject],
        report: &mut PassReport,
    ) -> EngineResult<()> {
        let descriptor = self.descriptor(type_name)?.clone();
        let converter = self
            .registry
            .converter(type_name)
            .ok_or_else(|| EngineError::unknown_type(type_name))?;

        // claim a slot per object before any conversion writes begin
        let slots: Vec<RecordIndex> = batch
            .iter()
            .map(|object| {
                self.cache
                    .resolve_index(descriptor.keyword(), object.application_id().unwrap_or_default())
            })
            .collect::<Result<_, _>>()?;
        let work: Vec<(SharedObject, RecordIndex)> =
            batch.iter().cloned().zip(slots).collect();

        let results = self.fan_out(&work, descriptor.is_parallel(), |(object, slot)| {
            self.convert_in(stream_id, &descriptor, converter.as_ref(), object, *slot)
        });

        for result in results {
            match result {
                Ok((upserted, unchanged)) => {
                    report.upserted += upserted;
                    report.unchanged += unchanged;
                }
                Err(EngineError::Cache(error)) => return Err(EngineError::Cache(error)),
                Err(error) => {
                    warn!(%error, "object conversion failed");
                    report.failed += 1;
                    report.errors.push(error.to_string());
                }
            }
        }
        Ok(())
    }

    fn convert_in(
        &self,
        stream_id: &str,
        descriptor: &TypeDescriptor,
        converter: &dyn Converter,
        object: &SharedObject,
        slot: RecordIndex,
    ) -> EngineResult<(usize, usize)> {
        let drafts = converter.to_records(object.as_ref(), &self.cache)?;
        if drafts.is_empty() {
            // nothing to serialize: the cached state for this identity is
            // all there is left to diff against
            if let Some(id) = object.application_id() {
                self.cache.mark_previous(descriptor.keyword(), id)?;
            }
            return Ok((0, 0));
        }

        let mut upserted = 0;
        let mut unchanged = 0;
        for draft in drafts {
            let RecordDraft {
                payload,
                application_id,
                index,
            } = draft;
            let application_id =
                application_id.or_else(|| object.application_id().map(str::to_string));
            let index = match index {
                Some(index) => index,
                None => match application_id.as_deref() {
                    Some(id) => self.cache.resolve_index(descriptor.keyword(), id)?,
                    None => slot,
                },
            };
            let outcome = self.cache.upsert(
                descriptor.keyword(),
                index,
                payload,
                application_id.as_deref(),
                Some(stream_id),
                descriptor.kind(),
            )?;
            match outcome {
                UpsertOutcome::Unchanged => unchanged += 1,
                _ => upserted += 1,
            }
        }
        Ok((upserted, unchanged))
    }

    fn send_batch(
        &self,
        stream_id: &str,
        descriptor: &TypeDescriptor,
        report: &mut PassReport,
    ) -> EngineResult<Vec<SharedObject>> {
        let converter = self
            .registry
            .converter(descriptor.type_name())
            .ok_or_else(|| EngineError::unknown_type(descriptor.type_name()))?;
        let records = self.cache.latest_records(descriptor.keyword())?;

        let results = self.fan_out(&records, descriptor.is_parallel(), |record| {
            let object = converter.to_object(record, &self.cache)?;
            let application_id = match record.application_id() {
                Some(id) => id.clone(),
                None => {
                    // give the record a synthetic identity so the object
                    // can be matched back on a later reception
                    let id = self.cache.synthetic_application_id();
                    self.cache.upsert(
                        descriptor.keyword(),
                        record.index(),
                        record.payload(),
                        Some(id.as_str()),
                        Some(stream_id),
                        record.kind(),
                    )?;
                    id
                }
            };
            self.cache.attach_object(
                descriptor.keyword(),
                application_id.as_str(),
                Arc::clone(&object),
                None,
            )?;
            Ok(object)
        });

        let mut objects = Vec::new();
        for result in results {
            match result {
                Ok(object) => {
                    report.converted += 1;
                    objects.push(object);
                }
                Err(EngineError::Cache(error)) => return Err(EngineError::Cache(error)),
                Err(error) => {
                    warn!(%error, "record conversion failed");
                    report.failed += 1;
                    report.errors.push(error.to_string());
                }
            }
        }
        Ok(objects)
    }

    /// Runs `f` over the items, fanning out across worker threads when
    /// the type allows it. Result order matches item order.
    fn fan_out<T: Sync, R: Send>(
        &self,
        items: &[T],
        parallel: bool,
        f: impl Fn(&T) -> R + Sync,
    ) -> Vec<R> {
        let workers = self.config.workers.max(1);
        if !parallel || workers == 1 || items.len() <= 1 {
            return items.iter().map(&f).collect();
        }

        let chunk = items.len().div_ceil(workers);
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk)
                .map(|slice| scope.spawn(move || slice.iter().map(f).collect::<Vec<R>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    fn descriptor(&self, type_name: &str) -> EngineResult<&TypeDescriptor> {
        self.registry
            .descriptor(type_name)
            .ok_or_else(|| EngineError::unknown_type(type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockGraph, MockObject, MockTabular};
    use tabsync_core::{CacheConfig, CacheRecord, CommandKind, GraphObject};

    /// Passes the mock object's body through as the record payload.
    struct BodyConverter;

    impl Converter for BodyConverter {
        fn to_records(
            &self,
            object: &dyn GraphObject,
            _cache: &SyncCache,
        ) -> EngineResult<Vec<RecordDraft>> {
            let mock = object
                .as_any()
                .downcast_ref::<MockObject>()
                .ok_or_else(|| EngineError::conversion("Point", None, "unexpected object"))?;
            if mock.body == "poison" {
                return Err(EngineError::conversion(
                    "Point",
                    object.application_id(),
                    "unserializable body",
                ));
            }
            Ok(vec![RecordDraft::new(mock.body.clone())])
        }

        fn to_object(
            &self,
            record: &CacheRecord,
            _cache: &SyncCache,
        ) -> EngineResult<SharedObject> {
            Ok(MockObject::new(
                "Point",
                record.application_id().map(|id| id.as_str()),
                record.payload(),
            ))
        }
    }

    fn point_registry(parallel: bool) -> Arc<ConverterRegistry> {
        let mut registry = ConverterRegistry::new();
        let mut descriptor =
            TypeDescriptor::new("Point", "NODE", CommandKind::Indexed).unwrap();
        if parallel {
            descriptor = descriptor.parallel();
        }
        registry.register(descriptor, Arc::new(BodyConverter)).unwrap();
        Arc::new(registry)
    }

    fn pass(parallel: bool) -> (ReconcilePass, Arc<MockTabular>, Arc<MockGraph>) {
        let tabular = Arc::new(MockTabular::new());
        let graph = Arc::new(MockGraph::new());
        let pass = ReconcilePass::new(
            Arc::new(SyncCache::new(CacheConfig::default())),
            point_registry(parallel),
            Arc::clone(&tabular) as Arc<dyn TabularClient>,
            Arc::clone(&graph) as Arc<dyn GraphClient>,
        );
        (pass, tabular, graph)
    }

    #[test]
    fn receive_writes_pulled_objects() {
        let (pass, tabular, graph) = pass(false);
        graph.set_pull(
            "s1",
            vec![
                MockObject::new("Point", Some("a1"), "X,1,0,0"),
                MockObject::new("Point", Some("a2"), "X,2,0,0"),
            ],
        );

        let report = pass.receive("s1").unwrap();
        assert_eq!(report.pulled, 2);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.written, 2);
        assert_eq!(report.deleted, 0);

        let executed = tabular.executed();
        assert!(executed.iter().any(|c| c.contains("{app_id:a1}")));
        assert!(executed.iter().all(|c| c.starts_with("SET\t")));
    }

    #[test]
    fn receive_recovers_per_object_failures() {
        let (pass, _tabular, graph) = pass(true);
        graph.set_pull(
            "s1",
            vec![
                MockObject::new("Point", Some("a1"), "X,1,0,0"),
                MockObject::new("Point", Some("a2"), "poison"),
                MockObject::new("Point", Some("a3"), "X,3,0,0"),
            ],
        );

        let report = pass.receive("s1").unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("a2"));
    }

    #[test]
    fn receive_skips_unregistered_types() {
        let (pass, _tabular, graph) = pass(false);
        graph.set_pull("s1", vec![MockObject::new("Mystery", Some("m1"), "?")]);

        let report = pass.receive("s1").unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.upserted, 0);
    }

    #[test]
    fn second_receive_of_same_stream_is_quiet() {
        let (pass, tabular, graph) = pass(false);
        graph.set_pull("s1", vec![MockObject::new("Point", Some("a1"), "X,1,0,0")]);

        pass.receive("s1").unwrap();
        let first_commands = tabular.executed().len();

        // external store now holds what we wrote
        tabular.set_bulk_read(
            "NODE",
            vec!["SET\tNODE:{stream_id:s1}{app_id:a1}\t1\tX,1,0,0".to_string()],
        );
        tabular.set_highest_index("NODE", 1);

        let report = pass.receive("s1").unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(tabular.executed().len(), first_commands);
    }

    #[test]
    fn changed_object_supersedes_and_deletes() {
        let (pass, tabular, graph) = pass(false);
        graph.set_pull("s1", vec![MockObject::new("Point", Some("a1"), "X,1,0,0")]);
        pass.receive("s1").unwrap();

        tabular.set_bulk_read(
            "NODE",
            vec!["SET\tNODE:{stream_id:s1}{app_id:a1}\t1\tX,1,0,0".to_string()],
        );
        tabular.set_highest_index("NODE", 1);
        graph.set_pull("s1", vec![MockObject::new("Point", Some("a1"), "X,9,9,9")]);

        let report = pass.receive("s1").unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.deleted, 1);

        let executed = tabular.executed();
        let delete = executed.iter().rev().find(|c| c.starts_with("DELETE")).unwrap();
        assert_eq!(delete, "DELETE\tNODE\t1");
    }

    #[test]
    fn send_pushes_converted_records() {
        let (pass, tabular, graph) = pass(false);
        tabular.set_bulk_read(
            "NODE",
            vec![
                "NODE\t1\tX,1,0,0".to_string(),
                "NODE\t2\tX,2,0,0".to_string(),
            ],
        );
        tabular.set_highest_index("NODE", 2);

        let report = pass.send("s1").unwrap();
        assert_eq!(report.converted, 2);
        assert_eq!(report.pushed, 2);

        let pushed = graph.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "s1");
        assert_eq!(pushed[0].1.len(), 2);

        // records without identity were backfilled with synthetic ids
        let cache = pass.cache();
        let record = cache.record_at("NODE", RecordIndex::new(1)).unwrap().unwrap();
        assert!(record.application_id().unwrap().is_synthetic("tabsync/"));
        assert!(cache.contains_type("Point").unwrap());
    }

    #[test]
    fn wipe_deletes_everything_and_clears() {
        let (pass, tabular, graph) = pass(false);
        graph.set_pull(
            "s1",
            vec![
                MockObject::new("Point", Some("a1"), "X,1,0,0"),
                MockObject::new("Point", Some("a2"), "X,2,0,0"),
            ],
        );
        pass.receive("s1").unwrap();

        let report = pass.wipe().unwrap();
        assert_eq!(report.deleted, 2);
        assert!(pass.cache().is_empty());

        let executed = tabular.executed();
        let deletes: Vec<_> = executed.iter().filter(|c| c.starts_with("DELETE")).collect();
        assert_eq!(deletes.len(), 2);
    }

    #[test]
    fn pull_failure_aborts_the_pass() {
        let (pass, _tabular, graph) = pass(false);
        graph.fail_next_pull();
        assert!(matches!(pass.receive("s1"), Err(EngineError::Client { .. })));
    }
}
