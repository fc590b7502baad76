//! Role assignment for raw operation records.

use indexmap::{IndexMap, IndexSet};
use tether_types::{ExecutionBinding, Operation, OperationRecord, OperationRole, ParamKind, ParamLocation};

/// The parts of an operation's declared shape that decide its role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationShape {
    pub method: String,
    pub required_path_params: usize,
    pub has_body: bool,
}

/// Assign a role from an operation shape.
///
/// Mutating verbs always classify as [`OperationRole::Mutation`]; otherwise
/// required path parameters without a body make a parameterized fetch.
pub fn classify(shape: &OperationShape) -> OperationRole {
    let binding = ExecutionBinding::new(shape.method.as_str(), "");
    if binding.is_mutating_verb() {
        OperationRole::Mutation
    } else if shape.required_path_params > 0 && !shape.has_body {
        OperationRole::ParameterizedFetch
    } else {
        OperationRole::Fetch
    }
}

/// Build an immutable [`Operation`] from a manifest record.
///
/// Address template placeholders are always required. A role hint in the
/// record is kept unless the verb mutates.
pub fn operation_from_record(record: OperationRecord) -> Operation {
    let binding = ExecutionBinding {
        method: record.method.to_ascii_uppercase(),
        path: record.path,
        base_url: record.base_url,
    };
    let template_params = binding.path_params();

    let mut required_params = IndexSet::new();
    let mut optional_params = IndexSet::new();
    let mut param_types = IndexMap::new();
    let mut has_body = false;
    let mut required_path_params = 0;

    for param in &record.params {
        let in_path = param.location == Some(ParamLocation::Path) || template_params.contains(&param.name);
        has_body |= param.location == Some(ParamLocation::Body);
        param_types.insert(param.name.clone(), param.kind);
        if param.required || in_path {
            required_params.insert(param.name.clone());
            if in_path {
                required_path_params += 1;
            }
        } else {
            optional_params.insert(param.name.clone());
        }
    }
    for name in template_params {
        if required_params.insert(name.clone()) {
            param_types.insert(name, ParamKind::String);
            required_path_params += 1;
        }
    }

    let shape = OperationShape {
        method: binding.method.clone(),
        required_path_params,
        has_body,
    };
    let classified = classify(&shape);
    let role = match record.role {
        Some(hint) if classified != OperationRole::Mutation => hint,
        _ => classified,
    };

    Operation {
        name: record.name,
        summary: record.summary,
        required_params,
        optional_params,
        param_types,
        role,
        binding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::ParamRecord;

    fn shape(method: &str, required_path_params: usize, has_body: bool) -> OperationShape {
        OperationShape {
            method: method.to_string(),
            required_path_params,
            has_body,
        }
    }

    #[test]
    fn classification_table() {
        assert_eq!(classify(&shape("GET", 0, false)), OperationRole::Fetch);
        assert_eq!(classify(&shape("get", 1, false)), OperationRole::ParameterizedFetch);
        assert_eq!(classify(&shape("GET", 1, true)), OperationRole::Fetch);
        for verb in ["POST", "PUT", "PATCH", "DELETE"] {
            assert_eq!(classify(&shape(verb, 0, false)), OperationRole::Mutation, "{verb}");
        }
    }

    #[test]
    fn template_placeholders_become_required() {
        let record = OperationRecord {
            name: "get_mails".into(),
            summary: "List mails".into(),
            method: "get".into(),
            path: "/accounts/{account_id}/mails".into(),
            base_url: None,
            params: vec![ParamRecord {
                name: "limit".into(),
                kind: ParamKind::Integer,
                required: false,
                location: Some(ParamLocation::Query),
            }],
            role: None,
        };
        let operation = operation_from_record(record);
        assert_eq!(operation.binding.method, "GET");
        assert!(operation.required_params.contains("account_id"));
        assert!(operation.optional_params.contains("limit"));
        assert_eq!(operation.kind_of("limit"), ParamKind::Integer);
        assert_eq!(operation.role, OperationRole::ParameterizedFetch);
    }

    #[test]
    fn mutating_verb_overrides_role_hint() {
        let record = OperationRecord {
            name: "send_mail".into(),
            summary: String::new(),
            method: "POST".into(),
            path: "/mails".into(),
            base_url: None,
            params: Vec::new(),
            role: Some(OperationRole::Fetch),
        };
        assert_eq!(operation_from_record(record).role, OperationRole::Mutation);

        let search = OperationRecord {
            name: "search".into(),
            summary: String::new(),
            method: "GET".into(),
            path: "/search/{q}".into(),
            base_url: None,
            params: Vec::new(),
            role: Some(OperationRole::Fetch),
        };
        assert_eq!(operation_from_record(search).role, OperationRole::Fetch);
    }
}
