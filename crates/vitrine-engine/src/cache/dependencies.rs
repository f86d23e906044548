//! Dependency graph between cache keys.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use parking_lot::RwLock;
use vitrine_core::CacheKey;

use crate::settings::CascadeMode;

/// One key reached while walking dependents from an origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeStep {
    pub key: CacheKey,
    /// The key whose invalidation reached this one.
    pub parent: CacheKey,
    /// 1 for direct dependents of the origin.
    pub depth: usize,
}

#[derive(Debug, Default)]
struct Adjacency {
    /// dependency -> keys that depend on it
    dependents: HashMap<CacheKey, BTreeSet<CacheKey>>,
    /// key -> keys it depends on
    dependencies: HashMap<CacheKey, BTreeSet<CacheKey>>,
}

/// Shared adjacency from a key to the keys that depend on it.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: RwLock<Adjacency>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the dependencies of `key`.
    ///
    /// `key` is first removed from the dependent sets of its previous
    /// dependencies, then added under each new dependency. Self-edges are
    /// ignored.
    pub fn update_dependencies(&self, key: &CacheKey, dependencies: &[CacheKey]) {
        let mut graph = self.inner.write();

        let old = graph.dependencies.remove(key).unwrap_or_default();
        for dependency in &old {
            if let Some(dependents) = graph.dependents.get_mut(dependency) {
                dependents.remove(key);
                if dependents.is_empty() {
                    graph.dependents.remove(dependency);
                }
            }
        }

        let new: BTreeSet<CacheKey> = dependencies
            .iter()
            .filter(|dep| *dep != key)
            .cloned()
            .collect();

        for dependency in &new {
            graph
                .dependents
                .entry(dependency.clone())
                .or_default()
                .insert(key.clone());
        }

        if !new.is_empty() {
            graph.dependencies.insert(key.clone(), new);
        }
    }

    /// Direct dependents of `key`, sorted.
    pub fn dependents_of(&self, key: &CacheKey) -> Vec<CacheKey> {
        self.inner
            .read()
            .dependents
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Registered dependencies of `key`, sorted.
    pub fn dependencies_of(&self, key: &CacheKey) -> Vec<CacheKey> {
        self.inner
            .read()
            .dependencies
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Breadth-first walk over the dependents of `origin`.
    ///
    /// Every key appears at most once and the origin never appears, so cycles
    /// terminate. `TwoHop` stops after the dependents of direct dependents.
    pub fn cascade(&self, origin: &CacheKey, mode: CascadeMode) -> Vec<CascadeStep> {
        let graph = self.inner.read();
        let max_depth = mode.max_depth();

        let mut visited: HashSet<&CacheKey> = HashSet::from([origin]);
        let mut queue: VecDeque<(&CacheKey, usize)> = VecDeque::from([(origin, 0)]);
        let mut steps = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let Some(dependents) = graph.dependents.get(current) else {
                continue;
            };

            for dependent in dependents {
                if !visited.insert(dependent) {
                    continue;
                }
                steps.push(CascadeStep {
                    key: dependent.clone(),
                    parent: current.clone(),
                    depth: depth + 1,
                });
                queue.push_back((dependent, depth + 1));
            }
        }

        steps
    }

    pub fn clear(&self) {
        let mut graph = self.inner.write();
        graph.dependents.clear();
        graph.dependencies.clear();
    }

    /// Number of dependency -> dependent edges.
    pub fn edge_count(&self) -> usize {
        self.inner.read().dependents.values().map(BTreeSet::len).sum()
    }

    /// Number of keys with at least one registered dependency.
    pub fn tracked_keys(&self) -> usize {
        self.inner.read().dependencies.len()
    }
}
