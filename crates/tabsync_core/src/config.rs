//! Cache configuration.

use crate::keyword::AliasTable;

/// Configuration for a [`crate::SyncCache`].
///
/// # Example
///
/// ```rust,ignore
/// let config = CacheConfig::new()
///     .synthetic_prefix("tabsync/")
///     .alias("LOAD_BEAM_POINT", "LOAD_BEAM")
///     .alias("LOAD_BEAM_UDL", "LOAD_BEAM");
/// let cache = SyncCache::new(config);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Keyword alias table collapsing textual-subtype variants.
    pub aliases: AliasTable,

    /// Application-id prefix marking synthetic, system-generated entities.
    ///
    /// Records carrying this prefix are never proposed for external
    /// deletion and survive snapshots untouched.
    pub synthetic_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::new(),
            synthetic_prefix: "tabsync/".to_string(),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a keyword alias.
    #[must_use]
    pub fn alias(mut self, alias: impl AsRef<str>, canonical: impl AsRef<str>) -> Self {
        self.aliases.insert(alias, canonical);
        self
    }

    /// Sets the synthetic application-id prefix.
    #[must_use]
    pub fn synthetic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.synthetic_prefix = prefix.into();
        self
    }
}
