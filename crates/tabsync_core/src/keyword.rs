//! Table keyword normalization.

use std::collections::HashMap;
use std::fmt;

/// Maps textual-subtype keyword variants onto one canonical keyword.
///
/// Some tables are written under several subtype keywords but read back in
/// bulk under a single one. Collapsing the variants at the cache boundary
/// keeps bulk reads matching cache entries. Aliases are configuration, not
/// hard-coded logic; the table is empty by default.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    /// Creates an empty alias table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an alias. Both sides are stored case-insensitively.
    pub fn insert(&mut self, alias: impl AsRef<str>, canonical: impl AsRef<str>) {
        self.map.insert(
            alias.as_ref().trim().to_ascii_uppercase(),
            canonical.as_ref().trim().to_ascii_uppercase(),
        );
    }

    /// Adds an alias, builder style.
    #[must_use]
    pub fn with(mut self, alias: impl AsRef<str>, canonical: impl AsRef<str>) -> Self {
        self.insert(alias, canonical);
        self
    }

    /// Resolves an already-uppercased keyword through the table.
    fn resolve<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.map.get(keyword).map_or(keyword, String::as_str)
    }

    /// Returns the number of registered aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no aliases are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Canonical, case-insensitive table identifier.
///
/// Construction normalizes the raw keyword: whitespace is trimmed, the
/// text is upper-cased, a numeric version suffix (`NODE.3` -> `NODE`) is
/// stripped, and the alias table collapses subtype variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(String);

impl Keyword {
    /// Normalizes a raw keyword against an alias table.
    ///
    /// Returns `None` if the keyword is empty after normalization.
    #[must_use]
    pub fn canonical(raw: &str, aliases: &AliasTable) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let base = strip_version_suffix(&upper);
        if base.is_empty() {
            return None;
        }
        Some(Self(aliases.resolve(base).to_string()))
    }

    /// Returns the canonical keyword text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips a trailing `.<digits>` version suffix, if present.
fn strip_version_suffix(keyword: &str) -> &str {
    match keyword.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => keyword,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive() {
        let aliases = AliasTable::new();
        let a = Keyword::canonical("node", &aliases).unwrap();
        let b = Keyword::canonical("NODE", &aliases).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "NODE");
    }

    #[test]
    fn version_suffix_stripped() {
        let aliases = AliasTable::new();
        let k = Keyword::canonical("NODE.3", &aliases).unwrap();
        assert_eq!(k.as_str(), "NODE");
    }

    #[test]
    fn non_numeric_suffix_kept() {
        let aliases = AliasTable::new();
        let k = Keyword::canonical("LOAD.X", &aliases).unwrap();
        assert_eq!(k.as_str(), "LOAD.X");
    }

    #[test]
    fn alias_collapses_subtypes() {
        let aliases = AliasTable::new()
            .with("LOAD_BEAM_POINT", "LOAD_BEAM")
            .with("LOAD_BEAM_UDL", "LOAD_BEAM");
        let a = Keyword::canonical("load_beam_point.2", &aliases).unwrap();
        let b = Keyword::canonical("LOAD_BEAM_UDL", &aliases).unwrap();
        assert_eq!(a.as_str(), "LOAD_BEAM");
        assert_eq!(b.as_str(), "LOAD_BEAM");
    }

    #[test]
    fn empty_keyword_rejected() {
        let aliases = AliasTable::new();
        assert!(Keyword::canonical("  ", &aliases).is_none());
        assert!(Keyword::canonical("", &aliases).is_none());
    }
}
