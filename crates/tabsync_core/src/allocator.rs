//! Positional index allocation with provisional reservations.

use crate::keyword::Keyword;
use crate::pair_map::PairMap;
use crate::types::{AppId, RecordIndex};
use std::collections::{HashMap, HashSet};

/// Allocation state for one keyword's index sequence.
#[derive(Debug, Clone, Default)]
struct KeywordState {
    /// Indices backed by committed records or observed externally.
    used: HashSet<u32>,
    /// Indices that pre-existed outside this system's control.
    baseline: HashSet<u32>,
    /// Provisional index <-> application-id reservations.
    provisional: PairMap<u32, AppId>,
    /// Highest index ever seen for this keyword.
    high_water: u32,
}

impl KeywordState {
    /// Finds the smallest free positive index.
    ///
    /// Linear scan bounded by the high-water mark, falling back to the
    /// mark plus one, so allocation never fails.
    fn next_free(&self) -> u32 {
        for candidate in 1..=self.high_water {
            if !self.used.contains(&candidate) && !self.provisional.contains_left(&candidate) {
                return candidate;
            }
        }
        self.high_water + 1
    }

    fn note(&mut self, index: u32) {
        if index > self.high_water {
            self.high_water = index;
        }
    }
}

/// Hands out positional indices scoped per keyword.
///
/// An index resolved for a `(keyword, application id)` pair is stable
/// across repeated calls until the matching upsert commits it, and is
/// guaranteed distinct from every index already committed or provisionally
/// reserved for that keyword.
///
/// The allocator is an explicit instance owned by the cache; there is no
/// process-wide state, and [`IndexAllocator::reset_to_baseline`] restores
/// the used sets as they stood before this system began writing.
#[derive(Debug, Clone, Default)]
pub struct IndexAllocator {
    tables: HashMap<Keyword, KeywordState>,
}

impl IndexAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an index for an entity.
    ///
    /// With no application id there is no identity to track, so every call
    /// returns a brand-new index. With one, a pending reservation is
    /// returned idempotently; otherwise the next free index is reserved
    /// provisionally.
    pub fn resolve(&mut self, keyword: &Keyword, application_id: Option<&AppId>) -> RecordIndex {
        let state = self.tables.entry(keyword.clone()).or_default();

        if let Some(id) = application_id {
            if let Some(index) = state.provisional.get_by_right(id) {
                return RecordIndex::new(*index);
            }
        }

        let index = state.next_free();
        state.note(index);
        match application_id {
            Some(id) => {
                // next_free never returns a reserved index, so this cannot conflict
                let _ = state.provisional.insert(index, id.clone());
            }
            None => {
                state.used.insert(index);
            }
        }
        RecordIndex::new(index)
    }

    /// Marks externally-observed indices as used, without identity.
    pub fn reserve_existing<I>(&mut self, keyword: &Keyword, indices: I)
    where
        I: IntoIterator<Item = u32>,
    {
        let state = self.tables.entry(keyword.clone()).or_default();
        for index in indices {
            state.used.insert(index);
            state.note(index);
        }
    }

    /// Commits the slot behind an upserted record.
    ///
    /// Clears any provisional reservation for the slot and marks the index
    /// used so it is never handed out again.
    pub fn commit(&mut self, keyword: &Keyword, index: RecordIndex) {
        let state = self.tables.entry(keyword.clone()).or_default();
        state.provisional.remove_by_left(&index.as_u32());
        state.used.insert(index.as_u32());
        state.note(index.as_u32());
    }

    /// Returns the pending reservation for an identity, if any.
    #[must_use]
    pub fn reservation(&self, keyword: &Keyword, application_id: &AppId) -> Option<RecordIndex> {
        self.tables
            .get(keyword)
            .and_then(|state| state.provisional.get_by_right(application_id))
            .map(|index| RecordIndex::new(*index))
    }

    /// Captures the current used sets as the baseline.
    ///
    /// Call after priming the allocator with externally pre-existing
    /// indices, before this system starts writing.
    pub fn baseline(&mut self) {
        for state in self.tables.values_mut() {
            state.baseline = state.used.clone();
        }
    }

    /// Restores the used sets to the baseline and drops all reservations.
    ///
    /// Externally pre-existing indices stay reserved; everything this
    /// system allocated becomes free again.
    pub fn reset_to_baseline(&mut self) {
        for state in self.tables.values_mut() {
            state.used = state.baseline.clone();
            state.provisional.clear();
            state.high_water = state.used.iter().copied().max().unwrap_or(0);
        }
    }

    /// Drops all allocation state.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::AliasTable;

    fn kw(raw: &str) -> Keyword {
        Keyword::canonical(raw, &AliasTable::new()).unwrap()
    }

    fn app(raw: &str) -> AppId {
        AppId::normalize(raw).unwrap()
    }

    #[test]
    fn resolve_is_idempotent_per_identity() {
        let mut alloc = IndexAllocator::new();
        let a = alloc.resolve(&kw("NODE"), Some(&app("a1")));
        let b = alloc.resolve(&kw("NODE"), Some(&app("a1")));
        assert_eq!(a, b);
    }

    #[test]
    fn anonymous_resolves_are_distinct() {
        let mut alloc = IndexAllocator::new();
        let a = alloc.resolve(&kw("BEAM"), None);
        let b = alloc.resolve(&kw("BEAM"), None);
        let c = alloc.resolve(&kw("BEAM"), None);
        assert!(a < b && b < c);
    }

    #[test]
    fn keywords_have_independent_sequences() {
        let mut alloc = IndexAllocator::new();
        let a = alloc.resolve(&kw("NODE"), Some(&app("a1")));
        let b = alloc.resolve(&kw("BEAM"), Some(&app("a1")));
        assert_eq!(a.as_u32(), 1);
        assert_eq!(b.as_u32(), 1);
    }

    #[test]
    fn never_collides_with_reserved_existing() {
        let mut alloc = IndexAllocator::new();
        alloc.reserve_existing(&kw("BEAM"), [1, 2, 4]);

        let a = alloc.resolve(&kw("BEAM"), None);
        let b = alloc.resolve(&kw("BEAM"), None);
        let c = alloc.resolve(&kw("BEAM"), None);

        assert_eq!(a.as_u32(), 3);
        assert_eq!(b.as_u32(), 5);
        assert_eq!(c.as_u32(), 6);
    }

    #[test]
    fn commit_clears_reservation_and_keeps_index_used() {
        let mut alloc = IndexAllocator::new();
        let index = alloc.resolve(&kw("NODE"), Some(&app("a1")));
        assert_eq!(alloc.reservation(&kw("NODE"), &app("a1")), Some(index));

        alloc.commit(&kw("NODE"), index);
        assert_eq!(alloc.reservation(&kw("NODE"), &app("a1")), None);

        // identity is now tracked by the committed record, so a fresh
        // resolve through the allocator hands out a different slot
        let next = alloc.resolve(&kw("NODE"), Some(&app("a2")));
        assert_ne!(next, index);
    }

    #[test]
    fn reset_to_baseline_frees_own_allocations_only() {
        let mut alloc = IndexAllocator::new();
        alloc.reserve_existing(&kw("NODE"), [1, 2]);
        alloc.baseline();

        let ours = alloc.resolve(&kw("NODE"), Some(&app("a1")));
        alloc.commit(&kw("NODE"), ours);
        assert_eq!(ours.as_u32(), 3);

        alloc.reset_to_baseline();

        // externally pre-existing indices are still off limits
        let again = alloc.resolve(&kw("NODE"), Some(&app("b1")));
        assert_eq!(again.as_u32(), 3);
    }

    #[test]
    fn fills_smallest_gap_first() {
        let mut alloc = IndexAllocator::new();
        alloc.reserve_existing(&kw("NODE"), [2, 3, 7]);
        assert_eq!(alloc.resolve(&kw("NODE"), None).as_u32(), 1);
        assert_eq!(alloc.resolve(&kw("NODE"), None).as_u32(), 4);
    }
}
