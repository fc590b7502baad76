//! Single-operation execution against a backend.
//!
//! Modules:
//! - `http`: reqwest-backed backend
//! - `fixture`: canned responses for offline use and tests

mod fixture;
mod http;

use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value};
use tether_types::{ExecutionContext, Operation, ParamKind};
use thiserror::Error;
use tracing::{debug, warn};

pub use fixture::{FixtureBackend, Invocation};
pub use http::HttpBackend;

use crate::{EngineError, UnresolvedParam};

/// Failure reported by a backend for one outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl BackendFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Executes one operation with a complete argument set.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(
        &self,
        operation: &Operation,
        arguments: &JsonMap<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value, BackendFailure>;
}

/// Validates arguments and performs exactly one bounded backend call.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `operation` once. No retries, no caching.
    ///
    /// Undeclared and `null` arguments are dropped before the backend sees them.
    pub async fn execute(
        &self,
        operation: &Operation,
        arguments: &JsonMap<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        let arguments = prepare_arguments(operation, arguments)?;
        let start = Instant::now();
        debug!(
            operation = %operation.name,
            role = %operation.role,
            argument_count = arguments.len(),
            "dispatching operation"
        );

        let outcome = tokio::time::timeout(self.timeout, self.backend.execute(operation, &arguments, context)).await;
        match outcome {
            Ok(Ok(payload)) => {
                debug!(
                    operation = %operation.name,
                    duration_ms = start.elapsed().as_millis(),
                    "operation completed"
                );
                Ok(payload)
            }
            Ok(Err(failure)) => {
                warn!(
                    operation = %operation.name,
                    status = ?failure.status,
                    duration_ms = start.elapsed().as_millis(),
                    "operation failed"
                );
                Err(EngineError::Backend {
                    operation: operation.name.clone(),
                    status: failure.status,
                    message: failure.message,
                })
            }
            Err(_) => {
                warn!(
                    operation = %operation.name,
                    timeout_ms = self.timeout.as_millis(),
                    "operation timed out"
                );
                Err(EngineError::Backend {
                    operation: operation.name.clone(),
                    status: None,
                    message: format!("timed out after {} ms", self.timeout.as_millis()),
                })
            }
        }
    }
}

/// Keep declared, non-null arguments and check them against the declared kinds.
fn prepare_arguments(operation: &Operation, arguments: &JsonMap<String, Value>) -> Result<JsonMap<String, Value>, EngineError> {
    let missing = operation.missing_params(arguments);
    if !missing.is_empty() {
        return Err(EngineError::UnresolvedDependency {
            operation: operation.name.clone(),
            unresolved: missing
                .into_iter()
                .map(|name| UnresolvedParam {
                    name,
                    candidates: Vec::new(),
                    causes: Vec::new(),
                })
                .collect(),
        });
    }

    let mut prepared = JsonMap::new();
    for (name, value) in arguments {
        if value.is_null() || !operation.declares(name) {
            continue;
        }
        let expected = operation.kind_of(name);
        if !expected.accepts(value) {
            return Err(EngineError::ArgumentType {
                operation: operation.name.clone(),
                param: name.clone(),
                expected,
                provided: ParamKind::of(value).map(ParamKind::as_str).unwrap_or("null").to_string(),
            });
        }
        prepared.insert(name.clone(), value.clone());
    }
    Ok(prepared)
}
