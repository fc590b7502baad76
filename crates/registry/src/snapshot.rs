//! Immutable catalogue snapshots and the store that swaps them.

use std::sync::{Arc, PoisonError, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tether_types::{CatalogManifest, IntentSpec};
use thiserror::Error;
use tracing::{info, warn};

use crate::{CatalogError, DependencyGraph, GraphError, OperationCatalog, operation_from_record};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("intent '{0}' is declared more than once")]
    DuplicateIntent(String),
}

/// Everything a call needs to look up: operations, rules, and intents.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub catalog: OperationCatalog,
    pub graph: DependencyGraph,
    pub intents: IndexMap<String, IntentSpec>,
    /// Monotonic counter bumped on every successful reload.
    pub generation: u64,
}

impl CatalogSnapshot {
    pub fn from_manifest(manifest: CatalogManifest) -> Result<Self, RegistryError> {
        let mut catalog = OperationCatalog::new();
        for record in manifest.operations {
            catalog.register(operation_from_record(record))?;
        }

        let mut graph = DependencyGraph::new();
        for rule in manifest.rules {
            if !catalog.contains(&rule.resolver_operation) {
                warn!(
                    target_param = %rule.target_param,
                    resolver = %rule.resolver_operation,
                    "rule references an operation missing from the catalogue"
                );
            }
            graph.add_rule(rule)?;
        }

        let mut intents = IndexMap::new();
        for intent in manifest.intents {
            if let Some(unknown) = intent.operations.iter().find(|name| !catalog.contains(name)) {
                warn!(intent = %intent.name, operation = %unknown, "intent candidate missing from the catalogue");
            }
            if intents.contains_key(&intent.name) {
                return Err(RegistryError::DuplicateIntent(intent.name));
            }
            intents.insert(intent.name.clone(), intent);
        }

        Ok(Self {
            catalog,
            graph,
            intents,
            generation: 0,
        })
    }
}

/// Holds the active snapshot. Readers pin an `Arc` and keep it for the
/// duration of their call; `reload` swaps in a new one atomically.
#[derive(Debug)]
pub struct CatalogStore {
    current: RwLock<Arc<CatalogSnapshot>>,
    generation: AtomicU64,
}

impl CatalogStore {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        let generation = snapshot.generation;
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(generation),
        }
    }

    pub fn from_manifest(manifest: CatalogManifest) -> Result<Self, RegistryError> {
        Ok(Self::new(CatalogSnapshot::from_manifest(manifest)?))
    }

    /// The snapshot active right now.
    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Build a snapshot from `manifest` and make it current.
    ///
    /// On error the previous snapshot stays active. Returns the new generation.
    pub fn reload(&self, manifest: CatalogManifest) -> Result<u64, RegistryError> {
        let mut snapshot = CatalogSnapshot::from_manifest(manifest)?;
        let operations = snapshot.catalog.len();
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // the active snapshot always carries the highest generation
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.generation = generation;
        *current = Arc::new(snapshot);
        drop(current);
        info!(generation, operations, "catalogue reloaded");
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::{DependencyRule, OperationRecord};

    fn record(name: &str) -> OperationRecord {
        OperationRecord {
            name: name.to_string(),
            summary: String::new(),
            method: "GET".into(),
            path: format!("/{name}"),
            base_url: None,
            params: Vec::new(),
            role: None,
        }
    }

    #[test]
    fn reload_swaps_but_pinned_snapshots_survive() {
        let store = CatalogStore::from_manifest(CatalogManifest {
            operations: vec![record("get_accounts")],
            ..Default::default()
        })
        .expect("store");
        let pinned = store.current();

        let generation = store
            .reload(CatalogManifest {
                operations: vec![record("get_accounts"), record("get_mails")],
                ..Default::default()
            })
            .expect("reload");

        assert_eq!(generation, 1);
        assert_eq!(pinned.catalog.len(), 1);
        assert_eq!(store.current().catalog.len(), 2);
        assert_eq!(store.current().generation, 1);
    }

    #[test]
    fn concurrent_reloads_leave_the_highest_generation_active() {
        let store = Arc::new(
            CatalogStore::from_manifest(CatalogManifest {
                operations: vec![record("get_accounts")],
                ..Default::default()
            })
            .expect("store"),
        );
        let workers = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .reload(CatalogManifest {
                            operations: vec![record(&format!("op_{index}"))],
                            ..Default::default()
                        })
                        .expect("reload")
                })
            })
            .collect::<Vec<_>>();
        let generations = workers
            .into_iter()
            .map(|worker| worker.join().expect("reload thread"))
            .collect::<Vec<_>>();

        assert_eq!(generations.iter().max(), Some(&8));
        assert_eq!(store.current().generation, 8);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let store = CatalogStore::from_manifest(CatalogManifest {
            operations: vec![record("get_accounts")],
            ..Default::default()
        })
        .expect("store");
        let broken = CatalogManifest {
            operations: vec![record("a"), record("a")],
            ..Default::default()
        };
        assert!(matches!(store.reload(broken), Err(RegistryError::Catalog(_))));
        assert!(store.current().catalog.contains("get_accounts"));
    }

    #[test]
    fn conflicting_rules_fail_construction() {
        let manifest = CatalogManifest {
            operations: vec![record("get_accounts")],
            rules: vec![
                DependencyRule::new("account_id", "get_accounts", "id"),
                DependencyRule::new("account_id", "get_accounts", "id"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            CatalogSnapshot::from_manifest(manifest),
            Err(RegistryError::Graph(GraphError::ConflictingRule { .. }))
        ));
    }
}
