//! Serialized catalogue manifest produced by the catalogue builder.

use serde::{Deserialize, Serialize};

use crate::{DependencyRule, OperationRole, ParamKind};

/// Everything the engine needs at startup: operations, rules, and intents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
    #[serde(default)]
    pub rules: Vec<DependencyRule>,
    #[serde(default)]
    pub intents: Vec<IntentSpec>,
}

/// Operation as emitted by the catalogue builder, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamRecord>,
    /// Optional role hint. A mutating verb always wins over the hint.
    #[serde(default)]
    pub role: Option<OperationRole>,
}

/// Where a parameter travels in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub location: Option<ParamLocation>,
}

/// Caller-facing convenience entry that routes loosely typed identifiers
/// to the most specific candidate operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// Candidate operations, most specific first
    pub operations: Vec<String>,
    /// Identifier keys advertised in the intent's input schema (for example
    /// `account_identifier`). Routing scores every supplied key, listed or not.
    #[serde(default)]
    pub identifiers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trip_minimal() {
        let json = r#"{
            "operations": [
                { "name": "get_accounts", "method": "GET", "path": "/accounts" },
                {
                    "name": "get_mails",
                    "method": "GET",
                    "path": "/accounts/{account_id}/mails",
                    "params": [{ "name": "account_id", "type": "string", "required": true }]
                }
            ],
            "rules": [
                { "target_param": "account_id", "resolver_operation": "get_accounts", "output_field": "id" }
            ]
        }"#;
        let manifest: CatalogManifest = serde_json::from_str(json).expect("deserialize manifest");
        assert_eq!(manifest.operations.len(), 2);
        assert!(manifest.intents.is_empty());
        let mails = &manifest.operations[1];
        assert!(mails.role.is_none());
        assert_eq!(mails.params[0].kind, ParamKind::String);
        assert!(mails.params[0].required);
        assert!(mails.params[0].location.is_none());
    }
}
