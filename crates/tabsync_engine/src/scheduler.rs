//! Dependency-ordered batch scheduling.

use crate::error::{EngineError, EngineResult};
use crate::registry::ConverterRegistry;
use std::collections::{BTreeMap, BTreeSet};

/// Computes ready-to-process tiers over a prerequisite graph.
///
/// A tier (topological generation) is the maximal set of types whose
/// prerequisites are all satisfied. Tiers are processed strictly in
/// order; within a tier, types are independent and per-object work may
/// fan out. This gives the same ordering guarantee as a topological sort
/// while letting whole generations run concurrently.
///
/// A graph where the ready set comes up empty with types still
/// unprocessed is cyclic or otherwise unsatisfiable; scheduling fails
/// with a diagnostic naming the stuck types rather than silently leaving
/// them unconverted.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    tiers: Vec<Vec<String>>,
}

impl BatchScheduler {
    /// Computes tiers from a prerequisite graph.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CyclicDependencies`] if the graph cannot be
    /// fully scheduled.
    pub fn new(graph: &BTreeMap<String, Vec<String>>) -> EngineResult<Self> {
        let mut done: BTreeSet<String> = BTreeSet::new();
        let mut tiers = Vec::new();

        while done.len() < graph.len() {
            let ready: Vec<String> = graph
                .iter()
                .filter(|(type_name, _)| !done.contains(*type_name))
                .filter(|(_, prerequisites)| prerequisites.iter().all(|p| done.contains(p)))
                .map(|(type_name, _)| type_name.clone())
                .collect();

            if ready.is_empty() {
                let stuck: Vec<String> = graph
                    .keys()
                    .filter(|type_name| !done.contains(*type_name))
                    .cloned()
                    .collect();
                return Err(EngineError::CyclicDependencies { stuck });
            }

            done.extend(ready.iter().cloned());
            tiers.push(ready);
        }

        Ok(Self { tiers })
    }

    /// Computes tiers from a validated registry.
    pub fn from_registry(registry: &ConverterRegistry) -> EngineResult<Self> {
        registry.validate()?;
        Self::new(&registry.prerequisite_graph())
    }

    /// Returns the tiers in processing order.
    #[must_use]
    pub fn tiers(&self) -> &[Vec<String>] {
        &self.tiers
    }

    /// Returns the number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Returns true if the graph was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(name, prereqs)| {
                (
                    (*name).to_string(),
                    prereqs.iter().map(|p| (*p).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn chain_produces_singleton_tiers() {
        let scheduler =
            BatchScheduler::new(&graph(&[("A", &[]), ("B", &["A"]), ("C", &["A", "B"])])).unwrap();
        assert_eq!(
            scheduler.tiers(),
            &[
                vec!["A".to_string()],
                vec!["B".to_string()],
                vec!["C".to_string()]
            ]
        );
    }

    #[test]
    fn independent_types_share_a_tier() {
        let scheduler = BatchScheduler::new(&graph(&[
            ("A", &[]),
            ("B", &[]),
            ("C", &["A", "B"]),
            ("D", &["A"]),
        ]))
        .unwrap();
        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.tiers()[0], vec!["A".to_string(), "B".to_string()]);
        assert_eq!(scheduler.tiers()[1], vec!["C".to_string(), "D".to_string()]);
    }

    #[test]
    fn two_cycle_aborts() {
        let result = BatchScheduler::new(&graph(&[("A", &["B"]), ("B", &["A"])]));
        match result {
            Err(EngineError::CyclicDependencies { stuck }) => {
                assert_eq!(stuck, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn cycle_diagnostic_names_only_stuck_types() {
        let result = BatchScheduler::new(&graph(&[
            ("A", &[]),
            ("B", &["C"]),
            ("C", &["B"]),
        ]));
        match result {
            Err(EngineError::CyclicDependencies { stuck }) => {
                assert_eq!(stuck, vec!["B".to_string(), "C".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn missing_prerequisite_is_stuck() {
        let result = BatchScheduler::new(&graph(&[("A", &["Ghost"])]));
        assert!(matches!(
            result,
            Err(EngineError::CyclicDependencies { .. })
        ));
    }

    #[test]
    fn empty_graph_schedules_nothing() {
        let scheduler = BatchScheduler::new(&BTreeMap::new()).unwrap();
        assert!(scheduler.is_empty());
    }

    proptest! {
        /// Every type of a valid DAG is scheduled exactly once, after all
        /// of its prerequisites.
        #[test]
        fn dag_schedules_every_type_once(edge_bits in proptest::collection::vec(any::<bool>(), 15)) {
            // build a DAG over 6 types: an edge may only point from a
            // lower-numbered type to a higher-numbered one
            let names: Vec<String> = (0..6).map(|i| format!("T{i}")).collect();
            let mut graph: BTreeMap<String, Vec<String>> = names
                .iter()
                .map(|n| (n.clone(), Vec::new()))
                .collect();
            let mut bit = 0;
            for to in 0..6usize {
                for from in 0..to {
                    if edge_bits[bit] {
                        graph.get_mut(&names[to]).unwrap().push(names[from].clone());
                    }
                    bit += 1;
                }
            }

            let scheduler = BatchScheduler::new(&graph).unwrap();

            let mut position = BTreeMap::new();
            for (tier_index, tier) in scheduler.tiers().iter().enumerate() {
                for type_name in tier {
                    prop_assert!(position.insert(type_name.clone(), tier_index).is_none());
                }
            }
            prop_assert_eq!(position.len(), 6);
            for (type_name, prerequisites) in &graph {
                for prerequisite in prerequisites {
                    prop_assert!(position[prerequisite] < position[type_name]);
                }
            }
        }
    }
}
