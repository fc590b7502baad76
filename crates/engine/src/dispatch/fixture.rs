use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value};
use tether_types::{ExecutionContext, Operation};
use tracing::debug;

use super::{Backend, BackendFailure};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub operation: String,
    pub arguments: JsonMap<String, Value>,
}

#[derive(Debug, Clone)]
enum Canned {
    Payload(Value),
    Failure { status: u16, body: String },
}

/// Backend answering from canned payloads.
///
/// List payloads are filtered by the call's scalar arguments: an item is kept
/// when every argument naming one of its fields carries the same value.
/// Every call is recorded and can be inspected with [`FixtureBackend::invocations`].
#[derive(Debug, Default)]
pub struct FixtureBackend {
    responses: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    invocations: Mutex<Vec<Invocation>>,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "<operation>": <payload>, ... }` from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("read fixtures {}", path.display()))?;
        let fixtures: JsonMap<String, Value> =
            serde_json::from_str(&content).with_context(|| format!("parse fixtures {}", path.display()))?;
        debug!(path = %path.display(), operations = fixtures.len(), "fixtures loaded");
        Ok(fixtures
            .into_iter()
            .fold(Self::new(), |backend, (operation, payload)| backend.with_response(operation, payload)))
    }

    pub fn with_response(mut self, operation: impl Into<String>, payload: Value) -> Self {
        self.responses.insert(operation.into(), Canned::Payload(payload));
        self
    }

    pub fn with_failure(mut self, operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(
            operation.into(),
            Canned::Failure {
                status,
                body: body.into(),
            },
        );
        self
    }

    pub fn with_delay(mut self, operation: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(operation.into(), delay);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded calls to `operation`.
    pub fn calls_to(&self, operation: &str) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|invocation| invocation.operation == operation)
            .count()
    }

    pub fn invoked_operations(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|invocation| invocation.operation)
            .collect()
    }
}

#[async_trait]
impl Backend for FixtureBackend {
    async fn execute(
        &self,
        operation: &Operation,
        arguments: &JsonMap<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Value, BackendFailure> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Invocation {
                operation: operation.name.clone(),
                arguments: arguments.clone(),
            });

        if let Some(delay) = self.delays.get(&operation.name) {
            tokio::time::sleep(*delay).await;
        }

        match self.responses.get(&operation.name) {
            Some(Canned::Payload(Value::Array(items))) => Ok(Value::Array(filter_items(items, arguments))),
            Some(Canned::Payload(payload)) => Ok(payload.clone()),
            Some(Canned::Failure { status, body }) => Err(BackendFailure::new(Some(*status), body.clone())),
            None => Err(BackendFailure::new(
                Some(404),
                format!("no fixture for operation '{}'", operation.name),
            )),
        }
    }
}

fn filter_items(items: &[Value], arguments: &JsonMap<String, Value>) -> Vec<Value> {
    items
        .iter()
        .filter(|item| {
            arguments.iter().all(|(key, expected)| match item.get(key) {
                Some(actual) if is_scalar(expected) => actual == expected,
                _ => true,
            })
        })
        .cloned()
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_types::{ExecutionBinding, OperationRole};

    fn operation(name: &str) -> Operation {
        Operation {
            name: name.into(),
            summary: String::new(),
            required_params: Default::default(),
            optional_params: Default::default(),
            param_types: Default::default(),
            role: OperationRole::Fetch,
            binding: ExecutionBinding::new("GET", "/"),
        }
    }

    #[tokio::test]
    async fn list_payloads_are_filtered_by_arguments() {
        let backend = FixtureBackend::new().with_response(
            "get_payments",
            json!([
                { "id": "p1", "status": "pending" },
                { "id": "p2", "status": "approved" },
                { "id": "p3" }
            ]),
        );
        let arguments = json!({ "status": "pending", "page": 1 }).as_object().cloned().expect("object");
        let payload = backend
            .execute(&operation("get_payments"), &arguments, &ExecutionContext::new())
            .await
            .expect("payload");
        assert_eq!(payload, json!([{ "id": "p1", "status": "pending" }, { "id": "p3" }]));
        assert_eq!(backend.calls_to("get_payments"), 1);
        assert_eq!(backend.invocations()[0].arguments, arguments);
    }

    #[tokio::test]
    async fn missing_fixture_is_a_404_failure() {
        let backend = FixtureBackend::new().with_failure("get_accounts", 500, "boom");
        let context = ExecutionContext::new();
        let failure = backend
            .execute(&operation("get_accounts"), &JsonMap::new(), &context)
            .await
            .expect_err("canned failure");
        assert_eq!(failure, BackendFailure::new(Some(500), "boom"));
        let missing = backend
            .execute(&operation("other"), &JsonMap::new(), &context)
            .await
            .expect_err("no fixture");
        assert_eq!(missing.status, Some(404));
    }

    #[test]
    fn fixtures_load_from_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fixtures.json");
        std::fs::write(&path, r#"{ "get_accounts": [{ "id": "acc_1" }] }"#).expect("write fixtures");
        let backend = FixtureBackend::from_file(&path).expect("load fixtures");
        assert!(backend.responses.contains_key("get_accounts"));
    }
}
