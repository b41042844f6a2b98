//! Bidirectional pair map.

use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// A pairwise bidirectional map, unique on both sides.
///
/// Every left value maps to exactly one right value and vice versa.
/// Running maxima on both sides are maintained cheaply: they are only
/// recomputed when the current maximum is removed, which is rare relative
/// to lookups.
///
/// Used by the index allocator for provisional reservation bookkeeping,
/// where the left side is a positional index and the right side an
/// application id.
#[derive(Debug, Clone)]
pub struct PairMap<L, R> {
    by_left: HashMap<L, R>,
    by_right: HashMap<R, L>,
    max_left: Option<L>,
    max_right: Option<R>,
}

impl<L, R> Default for PairMap<L, R> {
    fn default() -> Self {
        Self {
            by_left: HashMap::new(),
            by_right: HashMap::new(),
            max_left: None,
            max_right: None,
        }
    }
}

impl<L, R> PairMap<L, R>
where
    L: Clone + Eq + Hash + Ord + Debug,
    R: Clone + Eq + Hash + Ord + Debug,
{
    /// Creates an empty pair map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_left: HashMap::new(),
            by_right: HashMap::new(),
            max_left: None,
            max_right: None,
        }
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_left.len()
    }

    /// Returns true if the map holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_left.is_empty()
    }

    /// Inserts a pair. Both sides must currently be absent.
    pub fn insert(&mut self, left: L, right: R) -> CacheResult<()> {
        if self.by_left.contains_key(&left) {
            return Err(CacheError::pair_conflict(format!(
                "left value {left:?} is already paired"
            )));
        }
        if self.by_right.contains_key(&right) {
            return Err(CacheError::pair_conflict(format!(
                "right value {right:?} is already paired"
            )));
        }
        if self.max_left.as_ref().is_none_or(|m| left > *m) {
            self.max_left = Some(left.clone());
        }
        if self.max_right.as_ref().is_none_or(|m| right > *m) {
            self.max_right = Some(right.clone());
        }
        self.by_left.insert(left.clone(), right.clone());
        self.by_right.insert(right, left);
        Ok(())
    }

    /// Looks up the right value paired with `left`.
    #[must_use]
    pub fn get_by_left(&self, left: &L) -> Option<&R> {
        self.by_left.get(left)
    }

    /// Looks up the left value paired with `right`.
    #[must_use]
    pub fn get_by_right(&self, right: &R) -> Option<&L> {
        self.by_right.get(right)
    }

    /// Returns true if `left` is paired.
    #[must_use]
    pub fn contains_left(&self, left: &L) -> bool {
        self.by_left.contains_key(left)
    }

    /// Returns true if `right` is paired.
    #[must_use]
    pub fn contains_right(&self, right: &R) -> bool {
        self.by_right.contains_key(right)
    }

    /// Removes the pair keyed by `left`, returning its right value.
    pub fn remove_by_left(&mut self, left: &L) -> Option<R> {
        let right = self.by_left.remove(left)?;
        self.by_right.remove(&right);
        self.recompute_maxima_after_removal(left, &right);
        Some(right)
    }

    /// Removes the pair keyed by `right`, returning its left value.
    pub fn remove_by_right(&mut self, right: &R) -> Option<L> {
        let left = self.by_right.remove(right)?;
        self.by_left.remove(&left);
        self.recompute_maxima_after_removal(&left, right);
        Some(left)
    }

    /// Returns the maximum left value.
    #[must_use]
    pub fn max_left(&self) -> Option<&L> {
        self.max_left.as_ref()
    }

    /// Returns the maximum right value.
    #[must_use]
    pub fn max_right(&self) -> Option<&R> {
        self.max_right.as_ref()
    }

    /// Iterates over left values.
    pub fn lefts(&self) -> impl Iterator<Item = &L> {
        self.by_left.keys()
    }

    /// Removes all pairs.
    pub fn clear(&mut self) {
        self.by_left.clear();
        self.by_right.clear();
        self.max_left = None;
        self.max_right = None;
    }

    /// Recomputes a running maximum only if the removed value held it.
    fn recompute_maxima_after_removal(&mut self, left: &L, right: &R) {
        if self.max_left.as_ref() == Some(left) {
            self.max_left = self.by_left.keys().max().cloned();
        }
        if self.max_right.as_ref() == Some(right) {
            self.max_right = self.by_right.keys().max().cloned();
        }
    }
}
