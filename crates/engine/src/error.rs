//! Error taxonomy for calls made through the engine.

use serde_json::{Value, json};
use tether_types::ParamKind;
use thiserror::Error;

/// A required parameter that no rule could produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedParam {
    pub name: String,
    /// Resolver operations declared for the parameter
    pub candidates: Vec<String>,
    /// Why each attempted rule did not produce a value
    pub causes: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("unknown operation '{name}'")]
    UnknownOperation { name: String },

    #[error("cannot call '{operation}': missing required parameter(s) {}", join_names(unresolved))]
    UnresolvedDependency {
        operation: String,
        unresolved: Vec<UnresolvedParam>,
    },

    #[error("argument '{param}' of '{operation}' must be {expected}, got {provided}")]
    ArgumentType {
        operation: String,
        param: String,
        expected: ParamKind,
        provided: String,
    },

    #[error("backend call to '{operation}' failed{}: {message}", status.map(|code| format!(" with HTTP {code}")).unwrap_or_default())]
    Backend {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{} matches {} candidates: {}", describe_identifier(param, value.as_deref()), candidates.len(), candidates.join(", "))]
    AmbiguousIdentifier {
        param: String,
        value: Option<String>,
        candidates: Vec<String>,
    },

    #[error("resolving '{param}' for '{operation}' via '{resolver}' failed: {source}")]
    ResolverFailed {
        operation: String,
        param: String,
        resolver: String,
        source: Box<EngineError>,
    },

    #[error("call to '{operation}' was cancelled")]
    Cancelled { operation: String },
}

fn join_names(unresolved: &[UnresolvedParam]) -> String {
    unresolved
        .iter()
        .map(|param| format!("'{}'", param.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_identifier(param: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("identifier '{value}' for '{param}'"),
        None => format!("resolver result for '{param}'"),
    }
}

impl EngineError {
    /// Stable snake_case identifier of the error class.
    ///
    /// A `ResolverFailed` chain reports the kind of its root cause.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "unknown_operation",
            Self::UnresolvedDependency { .. } => "unresolved_dependency",
            Self::ArgumentType { .. } => "argument_type",
            Self::Backend { .. } => "backend",
            Self::AmbiguousIdentifier { .. } => "ambiguous_identifier",
            Self::ResolverFailed { source, .. } => source.kind(),
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Innermost error of a `ResolverFailed` chain, or `self`.
    pub fn root_cause(&self) -> &EngineError {
        let mut current = self;
        while let Self::ResolverFailed { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Operations traversed from the top-level call down to the root cause.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Self::ResolverFailed {
            operation, resolver, source, ..
        } = current
        {
            if chain.last() != Some(operation) {
                chain.push(operation.clone());
            }
            chain.push(resolver.clone());
            current = source.as_ref();
        }
        chain
    }

    /// A suggested next step for the caller, when one exists.
    pub fn guidance(&self) -> Option<String> {
        match self.root_cause() {
            Self::UnresolvedDependency { unresolved, .. } => {
                let steps = unresolved
                    .iter()
                    .map(|param| match param.candidates.as_slice() {
                        [] => format!("pass '{}' directly", param.name),
                        candidates => format!(
                            "call {} to obtain '{}', or pass '{}' directly",
                            candidates
                                .iter()
                                .map(|name| format!("'{name}'"))
                                .collect::<Vec<_>>()
                                .join(" or "),
                            param.name,
                            param.name
                        ),
                    })
                    .collect::<Vec<_>>();
                Some(format!("Suggested workflow: {}.", steps.join("; ")))
            }
            Self::AmbiguousIdentifier { param, .. } => Some(format!(
                "Pass a more specific identifier, or pass '{param}' directly using one of the listed candidates."
            )),
            Self::UnknownOperation { .. } => Some("Call list_operations to see the available operations.".to_string()),
            Self::ArgumentType { param, expected, .. } => Some(format!("Pass '{param}' as {expected}.")),
            _ => None,
        }
    }

    /// Structured, serializable details for protocol responses.
    pub fn details(&self) -> Value {
        match self {
            Self::UnknownOperation { name } => json!({ "operation": name }),
            Self::UnresolvedDependency { operation, unresolved } => json!({
                "operation": operation,
                "missing": unresolved.iter().map(|param| param.name.clone()).collect::<Vec<_>>(),
                "parameters": unresolved
                    .iter()
                    .map(|param| json!({
                        "name": param.name,
                        "candidate_resolvers": param.candidates,
                        "causes": param.causes,
                    }))
                    .collect::<Vec<_>>(),
            }),
            Self::ArgumentType {
                operation,
                param,
                expected,
                provided,
            } => json!({
                "operation": operation,
                "param": param,
                "expected": expected.as_str(),
                "provided": provided,
            }),
            Self::Backend {
                operation,
                status,
                message,
            } => json!({ "operation": operation, "status": status, "body": message }),
            Self::AmbiguousIdentifier {
                param,
                value,
                candidates,
            } => json!({ "param": param, "value": value, "candidates": candidates }),
            Self::ResolverFailed { param, .. } => json!({
                "param": param,
                "chain": self.chain(),
                "root_cause": {
                    "kind": self.kind(),
                    "message": self.root_cause().to_string(),
                    "details": self.root_cause().details(),
                },
            }),
            Self::Cancelled { operation } => json!({ "operation": operation }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_failure() -> EngineError {
        EngineError::Backend {
            operation: "get_accounts".into(),
            status: Some(503),
            message: "unavailable".into(),
        }
    }

    #[test]
    fn resolver_failed_reports_root_kind_and_chain() {
        let nested = EngineError::ResolverFailed {
            operation: "get_folders".into(),
            param: "account_id".into(),
            resolver: "get_accounts".into(),
            source: Box::new(backend_failure()),
        };
        let top = EngineError::ResolverFailed {
            operation: "get_mails".into(),
            param: "folder_id".into(),
            resolver: "get_folders".into(),
            source: Box::new(nested),
        };
        assert_eq!(top.kind(), "backend");
        assert_eq!(top.chain(), vec!["get_mails", "get_folders", "get_accounts"]);
        assert!(top.to_string().contains("HTTP 503"));
        assert_eq!(top.details()["root_cause"]["details"]["status"], 503);
    }

    #[test]
    fn unresolved_guidance_names_resolvers() {
        let error = EngineError::UnresolvedDependency {
            operation: "get_mails".into(),
            unresolved: vec![
                UnresolvedParam {
                    name: "account_id".into(),
                    candidates: vec!["get_accounts".into()],
                    causes: vec!["get_accounts returned no items".into()],
                },
                UnresolvedParam {
                    name: "folder_id".into(),
                    candidates: Vec::new(),
                    causes: Vec::new(),
                },
            ],
        };
        assert_eq!(error.kind(), "unresolved_dependency");
        assert_eq!(
            error.to_string(),
            "cannot call 'get_mails': missing required parameter(s) 'account_id', 'folder_id'"
        );
        let guidance = error.guidance().expect("guidance");
        assert!(guidance.contains("call 'get_accounts' to obtain 'account_id'"));
        assert!(guidance.contains("pass 'folder_id' directly"));
        assert_eq!(error.details()["missing"], json!(["account_id", "folder_id"]));
    }
}
