//! Operation catalogue, classifier, and dependency graph.
//!
//! A [`CatalogManifest`](tether_types::CatalogManifest) is turned into an
//! immutable [`CatalogSnapshot`] once; the [`CatalogStore`] hands out pinned
//! snapshots to in-flight calls and swaps in new ones on reload.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod graph;
pub mod snapshot;

pub use catalog::{CatalogError, OperationCatalog};
pub use classify::{OperationShape, classify, operation_from_record};
pub use config::{MANIFEST_PATH_ENV, default_manifest_path, load_manifest, manifest_path_from_env};
pub use graph::{DependencyGraph, GraphError};
pub use snapshot::{CatalogSnapshot, CatalogStore, RegistryError};
