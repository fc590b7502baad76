//! # Tether Engine
//!
//! Dependency-aware invocation of catalogue operations.
//!
//! A caller names an operation and supplies whatever arguments it has. When a
//! required parameter is missing, the engine consults the dependency graph,
//! calls resolver operations to produce the value, merges it into the
//! arguments, and executes the original operation.
//!
//! ## Architecture
//!
//! - **`dispatch`**: argument validation and single bounded backend calls
//!   ([`HttpBackend`], [`FixtureBackend`])
//! - **`resolve`**: the resolution engine and its per-call context
//! - **`smart`**: intent routing for loosely typed identifiers
//! - **`gateway`**: `call` and `list_operations`, normalized for protocol surfaces
//! - **`config`**: runtime settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use serde_json::json;
//! use tether_engine::{Dispatcher, FixtureBackend, Gateway, ResolutionEngine};
//! use tether_registry::CatalogStore;
//! use tether_types::{CatalogManifest, ExecutionContext};
//!
//! # async fn run(manifest: CatalogManifest) -> anyhow::Result<()> {
//! let store = Arc::new(CatalogStore::from_manifest(manifest)?);
//! let backend = FixtureBackend::new().with_response("get_accounts", json!([{ "id": "acc_1" }]));
//! let engine = ResolutionEngine::new(Dispatcher::new(Arc::new(backend), Duration::from_secs(5)));
//! let gateway = Gateway::new(store, engine, ExecutionContext::new(), 50);
//!
//! let outcome = gateway.call("get_mails", serde_json::Map::new()).await;
//! println!("{}", outcome.to_value());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
mod error;
pub mod gateway;
pub mod resolve;
pub mod smart;

pub use config::EngineConfig;
pub use dispatch::{Backend, BackendFailure, Dispatcher, FixtureBackend, HttpBackend, Invocation};
pub use error::{EngineError, UnresolvedParam};
pub use gateway::{CallOutcome, EntryKind, ErrorReport, Gateway, OperationDescriptor, Truncation};
pub use resolve::{AttemptOutcome, Resolution, ResolutionContext, ResolutionEngine, ResolverAttempt};
pub use smart::{SmartEntry, choose_operation};
