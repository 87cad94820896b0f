//! In-memory cache for incremental runs
//!
//! Results are kept per (rule, module) together with the module fingerprint they were
//! computed under. A module's fingerprint covers its source and the fingerprints of its
//! imports, so editing a module invalidates it and every module importing it, directly or
//! not.

use crate::project::Project;
use crate::scope::ExposedNames;
use crate::syntax::ModuleName;
use log::debug;
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct CacheEntry {
    fingerprint: u64,
    value: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct CacheState {
    config_hash: String,
    entries: HashMap<(String, ModuleName), CacheEntry>,
}

/// Results of earlier runs, shared across engine runs
#[derive(Default)]
pub struct AnalysisCache {
    state: Mutex<CacheState>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set config hash (call before using cache)
    pub fn set_config_hash(&self, hash: &str) {
        let mut state = self.state();
        if state.config_hash != hash {
            if !state.entries.is_empty() {
                debug!("Configuration changed, dropping {} cached results", state.entries.len());
            }
            state.entries.clear();
            state.config_hash = hash.to_string();
        }
    }

    /// Cached value of `rule` for `module`, if it was computed under `fingerprint`
    pub fn get<T: Any + Send + Sync>(
        &self,
        rule: &str,
        module: &ModuleName,
        fingerprint: u64,
    ) -> Option<Arc<T>> {
        let found = self
            .state()
            .entries
            .get(&(rule.to_string(), module.clone()))
            .filter(|entry| entry.fingerprint == fingerprint)
            .and_then(|entry| Arc::clone(&entry.value).downcast::<T>().ok());

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put<T: Any + Send + Sync>(
        &self,
        rule: &str,
        module: &ModuleName,
        fingerprint: u64,
        value: Arc<T>,
    ) {
        self.state().entries.insert(
            (rule.to_string(), module.clone()),
            CacheEntry { fingerprint, value },
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.state().entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Reset hit and miss counters, keeping entries
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.state().entries.clear();
    }
}

/// Fingerprint every project module
///
/// `order` must list imports before their importers. Imports outside the project
/// contribute their exposed names when known, their name alone otherwise.
pub fn module_fingerprints(
    project: &Project,
    order: &[ModuleName],
    known: &BTreeMap<ModuleName, ExposedNames>,
) -> HashMap<ModuleName, u64> {
    let mut fingerprints: HashMap<ModuleName, u64> = HashMap::with_capacity(order.len());
    for name in order {
        let Some(module) = project.module(name) else {
            continue;
        };
        let mut hasher = DefaultHasher::new();
        module.source.hash(&mut hasher);
        for imported in module.imported_modules() {
            imported.hash(&mut hasher);
            if let Some(fingerprint) = fingerprints.get(imported) {
                fingerprint.hash(&mut hasher);
            } else if let Some(summary) = known.get(imported) {
                serde_json::to_string(summary)
                    .unwrap_or_default()
                    .hash(&mut hasher);
            }
        }
        fingerprints.insert(name.clone(), hasher.finish());
    }
    fingerprints
}

/// Hash a config for cache invalidation
pub fn hash_config(config: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImportGraph;
    use crate::syntax::parse_module;

    fn project(sources: &[&str]) -> Project {
        Project::from_modules(sources.iter().map(|s| parse_module(s).unwrap())).unwrap()
    }

    fn fingerprints(project: &Project) -> HashMap<ModuleName, u64> {
        let order = ImportGraph::from_project(project).topological_order().unwrap();
        module_fingerprints(project, &order, &BTreeMap::new())
    }

    #[test]
    fn test_put_get() {
        let cache = AnalysisCache::new();
        let module = ModuleName::from("Main");
        cache.put("rule", &module, 7, Arc::new(vec![1, 2, 3]));

        assert_eq!(cache.get::<Vec<i32>>("rule", &module, 7).as_deref(), Some(&vec![1, 2, 3]));
        assert!(cache.get::<Vec<i32>>("rule", &module, 8).is_none());
        assert!(cache.get::<Vec<i32>>("other", &module, 7).is_none());
        assert!(cache.get::<String>("rule", &module, 7).is_none());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);

        cache.reset_stats();
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_config_invalidation() {
        let cache = AnalysisCache::new();
        cache.set_config_hash("hash1");
        cache.put("rule", &ModuleName::from("A"), 1, Arc::new(()));

        cache.set_config_hash("hash1");
        assert_eq!(cache.stats().entries, 1);

        cache.set_config_hash("hash2");
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_fingerprint_changes_propagate_to_importers() {
        let before = project(&[
            "module Util exposing (..)\n\nhelper = 1\n",
            "module Page exposing (..)\n\nimport Util\n\nview = Util.helper\n",
            "module Other exposing (..)\n\nother = 2\n",
        ]);
        let after = project(&[
            "module Util exposing (..)\n\nhelper = 2\n",
            "module Page exposing (..)\n\nimport Util\n\nview = Util.helper\n",
            "module Other exposing (..)\n\nother = 2\n",
        ]);

        let before = fingerprints(&before);
        let after = fingerprints(&after);
        assert_ne!(before[&ModuleName::from("Util")], after[&ModuleName::from("Util")]);
        assert_ne!(before[&ModuleName::from("Page")], after[&ModuleName::from("Page")]);
        assert_eq!(before[&ModuleName::from("Other")], after[&ModuleName::from("Other")]);
    }

    #[test]
    fn test_hash_config_is_stable() {
        let a = BTreeMap::from([("x", 1), ("y", 2)]);
        let b = BTreeMap::from([("y", 2), ("x", 1)]);
        assert_eq!(hash_config(&a), hash_config(&b));
        assert_ne!(hash_config(&a), hash_config(&BTreeMap::from([("x", 1)])));
    }
}
