//! Resolve-and-call entry for loosely typed, human-supplied identifiers.
//!
//! An intent names candidate operations, most specific first. The facade
//! picks the candidate that can consume the most supplied identifiers and
//! hands the identifiers to the resolution engine, where selector rules map
//! them onto normalized parameters.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Value};
use tether_registry::CatalogSnapshot;
use tether_types::{ExecutionContext, IntentSpec, Operation};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{EngineError, Resolution, ResolutionEngine};

pub struct SmartEntry<'engine> {
    engine: &'engine ResolutionEngine,
}

impl<'engine> SmartEntry<'engine> {
    pub fn new(engine: &'engine ResolutionEngine) -> Self {
        Self { engine }
    }

    /// Route `identifiers` to the most specific candidate of `intent` and call it.
    ///
    /// An undeclared intent that names an operation acts as a single-candidate intent.
    pub async fn smart_call(
        &self,
        snapshot: Arc<CatalogSnapshot>,
        intent: &str,
        identifiers: JsonMap<String, Value>,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution, EngineError> {
        let operation = match snapshot.intents.get(intent) {
            Some(spec) => choose_operation(&snapshot, spec, &identifiers)?.name.clone(),
            None if snapshot.catalog.contains(intent) => intent.to_string(),
            None => return Err(EngineError::UnknownOperation { name: intent.to_string() }),
        };
        debug!(intent, operation = %operation, identifiers = identifiers.len(), "intent routed");
        self.engine
            .resolve_and_call(snapshot, &operation, identifiers, context, cancel)
            .await
    }
}

/// The candidate consuming the most supplied identifiers; ties keep declaration order.
pub fn choose_operation<'s>(
    snapshot: &'s CatalogSnapshot,
    intent: &IntentSpec,
    identifiers: &JsonMap<String, Value>,
) -> Result<&'s Operation, EngineError> {
    let mut best: Option<(&Operation, usize)> = None;
    for name in &intent.operations {
        let Ok(operation) = snapshot.catalog.lookup(name) else {
            continue;
        };
        let score = consumed_identifiers(snapshot, operation, identifiers);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((operation, score));
        }
    }
    best.map(|(operation, _)| operation).ok_or_else(|| EngineError::UnknownOperation {
        name: intent.operations.first().cloned().unwrap_or_else(|| intent.name.clone()),
    })
}

/// Identifiers usable either as the operation's own parameters or as selectors
/// of the rules for its required parameters.
fn consumed_identifiers(snapshot: &CatalogSnapshot, operation: &Operation, identifiers: &JsonMap<String, Value>) -> usize {
    identifiers
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter(|(key, _)| {
            operation.declares(key)
                || operation.required_params.iter().any(|param| {
                    snapshot
                        .graph
                        .rules_for(param)
                        .iter()
                        .any(|rule| rule.selector_params.iter().any(|selector| &selector.name == *key))
                })
        })
        .count()
}
