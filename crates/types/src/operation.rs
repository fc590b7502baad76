//! Invocable operation records.
//!
//! An [`Operation`] is the immutable, schematized description of one remote
//! action. Operations are produced once from a catalogue manifest and shared
//! read-only by every in-flight call.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Primitive kind accepted by an operation parameter.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    /// Kind of a concrete JSON value. `null` has no kind.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(number) if number.is_i64() || number.is_u64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Array(_) => Some(Self::Array),
            Value::Object(_) => Some(Self::Object),
        }
    }

    /// Whether `value` satisfies this kind. Integers satisfy `number`.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, Self::of(value)) {
            (_, None) => false,
            (Self::Number, Some(Self::Integer)) => true,
            (expected, Some(provided)) => expected == provided,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role assigned to an operation by the classifier.
///
/// Mutations are never selected automatically as resolvers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationRole {
    /// Plain data fetch without required path parameters.
    Fetch,
    /// Fetch addressed by one or more required path parameters.
    ParameterizedFetch,
    /// Operation with side effects (POST, PUT, PATCH, DELETE).
    Mutation,
}

impl OperationRole {
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Mutation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::ParameterizedFetch => "parameterized-fetch",
            Self::Mutation => "mutation",
        }
    }
}

impl fmt::Display for OperationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an operation reaches its backend: an HTTP method plus an address template.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionBinding {
    /// HTTP method (GET, POST, DELETE, ...)
    pub method: String,
    /// Address template, for example `/accounts/{account_id}/mails`
    pub path: String,
    /// Optional service base URL overriding the configured default.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ExecutionBinding {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            base_url: None,
        }
    }

    /// Placeholder names in the address template, in order of appearance.
    pub fn path_params(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            let name = after[..end].trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
            rest = &after[end + 1..];
        }
        names
    }

    /// True for verbs that change server state.
    pub fn is_mutating_verb(&self) -> bool {
        matches!(self.method.to_ascii_uppercase().as_str(), "POST" | "PUT" | "PATCH" | "DELETE")
    }
}

/// A single named, schematized remote action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation name (for example `get_mails`)
    pub name: String,
    /// Brief description of what the operation does
    #[serde(default)]
    pub summary: String,
    /// Required parameter names in declaration order
    #[serde(default)]
    pub required_params: IndexSet<String>,
    /// Optional parameter names in declaration order
    #[serde(default)]
    pub optional_params: IndexSet<String>,
    /// Declared kind per parameter
    #[serde(default)]
    pub param_types: IndexMap<String, ParamKind>,
    /// Role assigned by the classifier
    pub role: OperationRole,
    /// Backend binding
    pub binding: ExecutionBinding,
}

impl Operation {
    /// Whether `name` is a declared (required or optional) parameter.
    pub fn declares(&self, name: &str) -> bool {
        self.required_params.contains(name) || self.optional_params.contains(name)
    }

    /// Declared kind for a parameter; undeclared kinds default to `string`.
    pub fn kind_of(&self, name: &str) -> ParamKind {
        self.param_types.get(name).copied().unwrap_or_default()
    }

    /// Required parameters absent (or `null`) in `args`, in declaration order.
    pub fn missing_params(&self, args: &JsonMap<String, Value>) -> Vec<String> {
        self.required_params
            .iter()
            .filter(|name| args.get(name.as_str()).is_none_or(Value::is_null))
            .cloned()
            .collect()
    }

    pub fn is_mutation(&self) -> bool {
        self.role.is_mutation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_values_satisfy_number_kind() {
        assert!(ParamKind::Number.accepts(&json!(3)));
        assert!(ParamKind::Number.accepts(&json!(3.5)));
        assert!(!ParamKind::Integer.accepts(&json!(3.5)));
        assert!(!ParamKind::String.accepts(&Value::Null));
        assert_eq!(ParamKind::of(&json!({"a": 1})), Some(ParamKind::Object));
    }

    #[test]
    fn path_params_follow_template_order() {
        let binding = ExecutionBinding::new("get", "/users/{user_id}/orders/{ order_id }");
        assert_eq!(binding.path_params(), vec!["user_id".to_string(), "order_id".to_string()]);
        assert!(!binding.is_mutating_verb());
        assert!(ExecutionBinding::new("patch", "/x").is_mutating_verb());
    }

    #[test]
    fn role_serializes_kebab_case() {
        let role: OperationRole = serde_json::from_str("\"parameterized-fetch\"").expect("deserialize role");
        assert_eq!(role, OperationRole::ParameterizedFetch);
        assert_eq!(role.to_string(), "parameterized-fetch");
    }
}
