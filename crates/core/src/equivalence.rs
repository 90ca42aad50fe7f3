// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source-hash equivalence classes.
//!
//! A method version may declare older source hashes it is compatible with.
//! Declarations are edges of an undirected graph per method; a class is a
//! connected component, so equivalence is symmetric and transitive even
//! when each version only names its immediate predecessor.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquivalenceClasses {
    edges: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl EquivalenceClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `hash` of `method` is equivalent to every hash in `equivalents`.
    pub fn declare(&mut self, method: &str, hash: &str, equivalents: &[String]) {
        let graph = self.edges.entry(method.to_string()).or_default();
        graph.entry(hash.to_string()).or_default();
        for other in equivalents.iter().filter(|o| o.as_str() != hash) {
            graph.entry(hash.to_string()).or_default().insert(other.clone());
            graph.entry(other.clone()).or_default().insert(hash.to_string());
        }
    }

    pub fn merge(&mut self, other: &EquivalenceClasses) {
        for (method, graph) in &other.edges {
            let mine = self.edges.entry(method.clone()).or_default();
            for (hash, neighbours) in graph {
                mine.entry(hash.clone()).or_default().extend(neighbours.iter().cloned());
            }
        }
    }

    /// Every hash equivalent to `hash`, across this graph and `others`.
    ///
    /// `hash` comes first; the rest are sorted.
    pub fn closure(&self, method: &str, hash: &str, others: &[&EquivalenceClasses]) -> Vec<String> {
        let graphs: Vec<&BTreeMap<String, BTreeSet<String>>> = std::iter::once(self)
            .chain(others.iter().copied())
            .filter_map(|c| c.edges.get(method))
            .collect();

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([hash.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for graph in &graphs {
                if let Some(neighbours) = graph.get(&current) {
                    queue.extend(neighbours.iter().filter(|n| !seen.contains(*n)).cloned());
                }
            }
        }

        seen.remove(hash);
        std::iter::once(hash.to_string()).chain(seen).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
#[path = "equivalence_tests.rs"]
mod tests;
