//! Shared type definitions for the Tether workspace.
//!
//! These records are produced once at catalogue load and then shared
//! read-only by the registry, the engine, and the protocol surfaces.

mod context;
pub mod manifest;
mod operation;
mod rule;

pub use context::ExecutionContext;
pub use manifest::{CatalogManifest, IntentSpec, OperationRecord, ParamLocation, ParamRecord};
pub use operation::{ExecutionBinding, Operation, OperationRole, ParamKind};
pub use rule::{Bind, DependencyRule, ItemSelection, SelectorParam};
