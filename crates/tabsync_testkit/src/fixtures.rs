//! Test fixtures for tabsync.

use tabsync_core::{CacheConfig, CommandKind, RecordIndex, SyncCache};

/// Creates a cache with the default configuration.
#[must_use]
pub fn basic_cache() -> SyncCache {
    SyncCache::new(CacheConfig::default())
}

/// Builds a deterministic node payload for index `i`.
#[must_use]
pub fn node_payload(i: u32) -> String {
    format!("X,{i},{},0", i * 2)
}

/// Builds the application id used by fixture node `i`.
#[must_use]
pub fn node_app_id(i: u32) -> String {
    format!("node-{i}")
}

/// Builds a verb-less bulk read line for fixture node `i`.
#[must_use]
pub fn bulk_node_line(i: u32) -> String {
    format!("NODE\t{i}\t{}", node_payload(i))
}

/// Builds a tagged `SET` line as a previous session would have written it.
#[must_use]
pub fn tagged_node_line(i: u32, stream_id: &str, application_id: &str) -> String {
    format!(
        "SET\tNODE:{{stream_id:{stream_id}}}{{app_id:{application_id}}}\t{i}\t{}",
        node_payload(i)
    )
}

/// Creates a cache holding `count` latest NODE records on stream `s1`.
///
/// Record `i` lives at index `i` under application id [`node_app_id`].
#[must_use]
pub fn cache_with_nodes(count: u32) -> SyncCache {
    let cache = basic_cache();
    for i in 1..=count {
        cache
            .upsert(
                "NODE",
                RecordIndex::new(i),
                node_payload(i),
                Some(&node_app_id(i)),
                Some("s1"),
                CommandKind::Indexed,
            )
            .unwrap();
    }
    cache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populated_cache_is_queryable() {
        let cache = cache_with_nodes(3);
        assert_eq!(cache.len(), 3);
        assert_eq!(
            cache.lookup_index("NODE", &node_app_id(2)).unwrap(),
            Some(RecordIndex::new(2))
        );
    }

    #[test]
    fn fixture_lines_parse() {
        let parsed = tabsync_core::wire::parse_line(&tagged_node_line(4, "s1", "a4")).unwrap();
        assert_eq!(parsed.index, 4);
        assert_eq!(parsed.field.application_id.as_deref(), Some("a4"));

        let parsed = tabsync_core::wire::parse_line(&bulk_node_line(2)).unwrap();
        assert_eq!(parsed.payload, node_payload(2));
    }
}
