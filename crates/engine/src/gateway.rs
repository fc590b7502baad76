//! The two caller-facing operations: `call` and `list_operations`.
//!
//! Every call pins the catalogue snapshot active when it starts, routes
//! intents through the smart-entry facade, and returns a normalized outcome
//! that protocol surfaces can serialize as-is.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map as JsonMap, Value, json};
use tether_registry::{CatalogSnapshot, CatalogStore, RegistryError};
use tether_types::{CatalogManifest, ExecutionContext, IntentSpec, Operation};
use tether_util::{redact_sensitive, truncate_collection};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{EngineError, Resolution, ResolutionEngine, SmartEntry};

/// Normalized result of [`Gateway::call`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub ok: bool,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Values the engine filled in for missing parameters
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub resolved_arguments: JsonMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Truncation {
    pub total_count: usize,
    pub returned_count: usize,
    pub truncated: bool,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

impl From<&EngineError> for ErrorReport {
    fn from(error: &EngineError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: redact_sensitive(&error.to_string()),
            details: error.details(),
            guidance: error.guidance(),
        }
    }
}

impl CallOutcome {
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.kind.as_str())
    }

    /// JSON form used by protocol surfaces.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|error| json!({ "ok": false, "error": { "kind": "internal", "message": error.to_string() } }))
    }
}

/// Whether a listed entry is a catalogue operation or an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Operation,
    Intent,
}

/// Public name and schema of one callable entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub description: String,
    pub input_schema: Value,
}

pub struct Gateway {
    store: Arc<CatalogStore>,
    engine: ResolutionEngine,
    context: ExecutionContext,
    max_response_items: usize,
}

impl Gateway {
    pub fn new(store: Arc<CatalogStore>, engine: ResolutionEngine, context: ExecutionContext, max_response_items: usize) -> Self {
        Self {
            store,
            engine,
            context,
            max_response_items,
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Call an operation or intent by name.
    pub async fn call(&self, name: &str, arguments: JsonMap<String, Value>) -> CallOutcome {
        self.call_with_cancel(name, arguments, &CancellationToken::new()).await
    }

    /// Like [`Gateway::call`]; cancelling `cancel` aborts the in-flight chain.
    pub async fn call_with_cancel(&self, name: &str, arguments: JsonMap<String, Value>, cancel: &CancellationToken) -> CallOutcome {
        let snapshot = self.store.current();
        info!(operation = name, generation = snapshot.generation, "call started");
        let result = if snapshot.intents.contains_key(name) {
            SmartEntry::new(&self.engine)
                .smart_call(snapshot, name, arguments, &self.context, cancel)
                .await
        } else {
            self.engine
                .resolve_and_call(snapshot, name, arguments, &self.context, cancel)
                .await
        };
        match result {
            Ok(resolution) => self.success(name, resolution),
            Err(error) => {
                warn!(operation = name, kind = error.kind(), error = %redact_sensitive(&error.to_string()), "call failed");
                CallOutcome {
                    ok: false,
                    operation: name.to_string(),
                    payload: None,
                    resolved_arguments: JsonMap::new(),
                    truncation: None,
                    error: Some(ErrorReport::from(&error)),
                }
            }
        }
    }

    fn success(&self, name: &str, resolution: Resolution) -> CallOutcome {
        let limited = truncate_collection(resolution.payload, self.max_response_items);
        let truncation = limited.note().map(|note| Truncation {
            total_count: limited.total_count,
            returned_count: limited.returned_count,
            truncated: limited.truncated,
            note,
        });
        CallOutcome {
            ok: true,
            operation: name.to_string(),
            payload: Some(limited.payload),
            resolved_arguments: resolution.resolved,
            truncation,
            error: None,
        }
    }

    /// Operations and intents of the current snapshot, with dependency hints.
    pub fn list_operations(&self) -> Vec<OperationDescriptor> {
        let snapshot = self.store.current();
        let operations = snapshot
            .catalog
            .all()
            .map(|operation| describe_operation(&snapshot, operation));
        let intents = snapshot.intents.values().map(|intent| describe_intent(&snapshot, intent));
        operations.chain(intents).collect()
    }

    /// Swap in a new catalogue. In-flight calls keep the snapshot they started with.
    pub fn reload(&self, manifest: CatalogManifest) -> Result<u64, RegistryError> {
        self.store.reload(manifest)
    }
}

fn describe_operation(snapshot: &CatalogSnapshot, operation: &Operation) -> OperationDescriptor {
    let mut description = if operation.summary.is_empty() {
        format!("{} {}", operation.binding.method, operation.binding.path)
    } else {
        operation.summary.clone()
    };
    let mut properties = JsonMap::new();
    let mut required = Vec::new();

    for name in operation.required_params.iter().chain(operation.optional_params.iter()) {
        properties.insert(name.clone(), json!({ "type": operation.kind_of(name).as_str() }));
    }

    for param in &operation.required_params {
        let rules = snapshot.graph.rules_for(param);
        if rules.is_empty() {
            required.push(param.clone());
            continue;
        }
        let resolvers = snapshot
            .graph
            .resolvers_for(param)
            .iter()
            .map(|resolver| format!("'{resolver}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        description.push_str(&format!("\n- '{param}' is resolved automatically via {resolvers} when omitted."));
        for selector in rules.iter().flat_map(|rule| rule.selector_params.iter()) {
            if properties.contains_key(&selector.name) {
                continue;
            }
            let matched = if selector.match_fields.is_empty() {
                String::new()
            } else {
                format!(" (matched against {})", selector.match_fields.join(", "))
            };
            description.push_str(&format!("\n- '{}' may be passed instead of '{param}'{matched}.", selector.name));
            properties.insert(
                selector.name.clone(),
                json!({
                    "type": "string",
                    "description": format!("Alternative identifier for '{param}'{matched}"),
                }),
            );
        }
    }
    if operation.is_mutation() {
        description.push_str("\n- Changes server state.");
    }

    OperationDescriptor {
        name: operation.name.clone(),
        kind: EntryKind::Operation,
        role: Some(operation.role.to_string()),
        description,
        input_schema: json!({ "type": "object", "properties": properties, "required": required }),
    }
}

fn describe_intent(snapshot: &CatalogSnapshot, intent: &IntentSpec) -> OperationDescriptor {
    let candidates = intent
        .operations
        .iter()
        .filter(|name| snapshot.catalog.contains(name))
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let summary = if intent.summary.is_empty() {
        format!("Intent '{}'", intent.name)
    } else {
        intent.summary.clone()
    };
    let properties = intent
        .identifiers
        .iter()
        .map(|identifier| (identifier.clone(), json!({ "type": "string" })))
        .collect::<JsonMap<_, _>>();

    OperationDescriptor {
        name: intent.name.clone(),
        kind: EntryKind::Intent,
        role: None,
        description: format!("{summary}\n- Routes to the most specific of: {candidates}."),
        input_schema: json!({ "type": "object", "properties": properties, "required": [] }),
    }
}
