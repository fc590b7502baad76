//! Dependency-aware resolution of missing required parameters.
//!
//! A top-level call runs as one chain: missing parameters are filled by
//! calling resolver operations (depth-first, first viable rule wins), the
//! resolved values are merged into the caller's arguments, and the original
//! operation is dispatched. All chain state lives in a [`ResolutionContext`]
//! that dies with the call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::{FutureExt, future::BoxFuture};
use serde_json::{Map as JsonMap, Value};
use tether_registry::CatalogSnapshot;
use tether_types::{DependencyRule, ExecutionContext, ItemSelection, Operation, SelectorParam};
use tether_util::{extract_collection_items, list_items, select_path};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Dispatcher, EngineError, UnresolvedParam};

/// What happened when one rule was tried for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The resolver ran and produced the value.
    Resolved,
    /// A selector value was already a normalized id.
    DirectMatch,
    /// The rule was not tried.
    Skipped(String),
    /// The rule was tried and produced nothing.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverAttempt {
    pub operation: String,
    pub param: String,
    pub resolver: String,
    pub outcome: AttemptOutcome,
}

/// Ephemeral state of one top-level call.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Top-level operation
    pub operation: String,
    /// Caller-supplied arguments of the top-level operation
    pub supplied: JsonMap<String, Value>,
    /// Values bound for the top-level operation's missing parameters
    pub resolved: JsonMap<String, Value>,
    visited: HashSet<(String, String)>,
    trace: Vec<ResolverAttempt>,
    memo: HashMap<String, Value>,
}

impl ResolutionContext {
    pub fn new(operation: impl Into<String>, supplied: JsonMap<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            supplied,
            ..Self::default()
        }
    }

    /// Every rule attempt of the chain, in the order they happened.
    pub fn trace(&self) -> &[ResolverAttempt] {
        &self.trace
    }
}

/// Successful top-level call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub payload: Value,
    pub resolved: JsonMap<String, Value>,
    pub trace: Vec<ResolverAttempt>,
}

/// Per-call environment shared by every level of the chain.
struct Chain {
    snapshot: Arc<CatalogSnapshot>,
    context: ExecutionContext,
    cancel: CancellationToken,
    state: ResolutionContext,
}

impl Chain {
    fn record(&mut self, operation: &str, param: &str, resolver: &str, outcome: AttemptOutcome) {
        self.state.trace.push(ResolverAttempt {
            operation: operation.to_string(),
            param: param.to_string(),
            resolver: resolver.to_string(),
            outcome,
        });
    }
}

enum ParamOutcome {
    Bound(Value),
    Unresolved {
        causes: Vec<String>,
        /// First resolver failure that was neither a miss nor a nested unresolved error
        failure: Option<(String, EngineError)>,
    },
}

enum Selection {
    Miss(String),
    Ambiguous(EngineError),
}

#[derive(Clone)]
pub struct ResolutionEngine {
    dispatcher: Dispatcher,
}

impl ResolutionEngine {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resolve `operation_name`'s missing required parameters and call it.
    ///
    /// `snapshot` is pinned for the whole chain; a concurrent reload never
    /// changes what this call sees.
    pub async fn resolve_and_call(
        &self,
        snapshot: Arc<CatalogSnapshot>,
        operation_name: &str,
        supplied: JsonMap<String, Value>,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution, EngineError> {
        let mut chain = Chain {
            snapshot,
            context: context.clone(),
            cancel: cancel.clone(),
            state: ResolutionContext::new(operation_name, supplied.clone()),
        };
        let payload = self.resolve(&mut chain, operation_name.to_string(), supplied, 0).await?;
        info!(
            operation = %operation_name,
            resolved = chain.state.resolved.len(),
            attempts = chain.state.trace.len(),
            "call completed"
        );
        Ok(Resolution {
            payload,
            resolved: chain.state.resolved,
            trace: chain.state.trace,
        })
    }

    fn resolve<'a>(
        &'a self,
        chain: &'a mut Chain,
        operation_name: String,
        arguments: JsonMap<String, Value>,
        depth: usize,
    ) -> BoxFuture<'a, Result<Value, EngineError>> {
        async move {
            if chain.cancel.is_cancelled() {
                return Err(EngineError::Cancelled { operation: operation_name });
            }
            let snapshot = Arc::clone(&chain.snapshot);
            let operation = snapshot
                .catalog
                .lookup(&operation_name)
                .map_err(|_| EngineError::UnknownOperation {
                    name: operation_name.clone(),
                })?;

            let missing = operation.missing_params(&arguments);
            if missing.is_empty() {
                return self.dispatch(chain, operation, &arguments).await;
            }
            debug!(operation = %operation.name, ?missing, depth, "resolving missing parameters");

            let mut resolved = JsonMap::new();
            let mut unresolved = Vec::new();
            let mut first_failure = None;
            for param in missing {
                match self
                    .resolve_param(chain, &snapshot, operation, &param, &arguments, &resolved, depth)
                    .await?
                {
                    ParamOutcome::Bound(value) => {
                        resolved.insert(param, value);
                    }
                    ParamOutcome::Unresolved { causes, failure } => {
                        if first_failure.is_none()
                            && let Some((resolver, source)) = failure
                        {
                            first_failure = Some(EngineError::ResolverFailed {
                                operation: operation.name.clone(),
                                param: param.clone(),
                                resolver,
                                source: Box::new(source),
                            });
                        }
                        unresolved.push(UnresolvedParam {
                            candidates: snapshot.graph.resolvers_for(&param),
                            name: param,
                            causes,
                        });
                    }
                }
            }

            if let Some(error) = first_failure {
                return Err(error);
            }
            if !unresolved.is_empty() {
                warn!(
                    operation = %operation.name,
                    unresolved = ?unresolved.iter().map(|param| param.name.as_str()).collect::<Vec<_>>(),
                    depth,
                    "dependencies could not be resolved"
                );
                return Err(EngineError::UnresolvedDependency {
                    operation: operation.name.clone(),
                    unresolved,
                });
            }

            if depth == 0 {
                chain.state.resolved = resolved.clone();
            }
            let mut merged = arguments;
            merged.extend(resolved);
            self.dispatch(chain, operation, &merged).await
        }
        .boxed()
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_param(
        &self,
        chain: &mut Chain,
        snapshot: &CatalogSnapshot,
        operation: &Operation,
        param: &str,
        arguments: &JsonMap<String, Value>,
        resolved: &JsonMap<String, Value>,
        depth: usize,
    ) -> Result<ParamOutcome, EngineError> {
        let declared = snapshot.graph.rules_for(param);
        let key = (operation.name.clone(), param.to_string());
        if chain.state.visited.contains(&key) {
            debug!(operation = %operation.name, param, "cycle detected");
            return Ok(ParamOutcome::Unresolved {
                causes: vec![format!(
                    "'{param}' of '{}' is already being resolved in this chain",
                    operation.name
                )],
                failure: None,
            });
        }

        let mut causes = declared
            .iter()
            .filter(|rule| !is_applicable(rule, arguments))
            .map(|rule| {
                format!(
                    "'{}' needs one of: {}",
                    rule.resolver_operation,
                    rule.selector_params
                        .iter()
                        .map(|selector| selector.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>();
        let rules = ordered_rules(declared, arguments);
        if rules.is_empty() {
            return Ok(ParamOutcome::Unresolved { causes, failure: None });
        }

        chain.state.visited.insert(key.clone());
        let outcome = self
            .try_rules(chain, snapshot, operation, param, &rules, arguments, resolved, depth)
            .await;
        chain.state.visited.remove(&key);

        match outcome? {
            ParamOutcome::Unresolved {
                causes: rule_causes,
                failure,
            } => {
                causes.extend(rule_causes);
                Ok(ParamOutcome::Unresolved { causes, failure })
            }
            bound => Ok(bound),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_rules(
        &self,
        chain: &mut Chain,
        snapshot: &CatalogSnapshot,
        operation: &Operation,
        param: &str,
        rules: &[&DependencyRule],
        arguments: &JsonMap<String, Value>,
        resolved: &JsonMap<String, Value>,
        depth: usize,
    ) -> Result<ParamOutcome, EngineError> {
        let mut causes = Vec::new();
        let mut failure = None;

        for rule in rules {
            let resolver_name = rule.resolver_operation.as_str();
            let Ok(resolver) = snapshot.catalog.lookup(resolver_name) else {
                let reason = format!("resolver '{resolver_name}' is not in the catalogue");
                chain.record(&operation.name, param, resolver_name, AttemptOutcome::Skipped(reason.clone()));
                causes.push(reason);
                continue;
            };
            if resolver.is_mutation() {
                let reason = format!("'{resolver_name}' is a mutation and is never called implicitly");
                chain.record(&operation.name, param, resolver_name, AttemptOutcome::Skipped(reason.clone()));
                causes.push(reason);
                continue;
            }

            let selectors = present_selectors(rule, arguments);
            let direct = selectors.iter().find_map(|(selector, value)| {
                value
                    .as_str()
                    .filter(|text| snapshot.graph.is_direct_match(selector, text))
                    .map(|_| (*value).clone())
            });
            if let Some(value) = direct {
                debug!(operation = %operation.name, param, resolver = resolver_name, "selector value used directly");
                chain.record(&operation.name, param, resolver_name, AttemptOutcome::DirectMatch);
                return Ok(ParamOutcome::Bound(value));
            }

            debug!(operation = %operation.name, param, resolver = resolver_name, depth, "trying resolver");
            let resolver_arguments = resolver_arguments(rule, &selectors, arguments, resolved);
            match self.call_resolver(chain, resolver_name, resolver_arguments, depth).await {
                Ok(payload) => match select_value(rule, param, &payload, &selectors) {
                    Ok(value) => {
                        chain.record(&operation.name, param, resolver_name, AttemptOutcome::Resolved);
                        return Ok(ParamOutcome::Bound(value));
                    }
                    Err(Selection::Miss(reason)) => {
                        let reason = format!("'{resolver_name}' {reason}");
                        chain.record(&operation.name, param, resolver_name, AttemptOutcome::Failed(reason.clone()));
                        causes.push(reason);
                    }
                    Err(Selection::Ambiguous(error)) => return Err(error),
                },
                Err(error @ (EngineError::AmbiguousIdentifier { .. } | EngineError::Cancelled { .. })) => return Err(error),
                Err(error) => {
                    let reason = format!("'{resolver_name}' failed: {error}");
                    chain.record(&operation.name, param, resolver_name, AttemptOutcome::Failed(reason.clone()));
                    causes.push(reason);
                    if failure.is_none() && !matches!(error, EngineError::UnresolvedDependency { .. }) {
                        failure = Some((resolver_name.to_string(), error));
                    }
                }
            }
        }

        Ok(ParamOutcome::Unresolved { causes, failure })
    }

    /// Call a resolver, reusing a result already produced in this chain for
    /// the same resolver and arguments.
    async fn call_resolver(
        &self,
        chain: &mut Chain,
        resolver: &str,
        arguments: JsonMap<String, Value>,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let memo_key = format!("{resolver}:{}", Value::Object(arguments.clone()));
        if let Some(payload) = chain.state.memo.get(&memo_key) {
            debug!(resolver, "reusing resolver result from this chain");
            return Ok(payload.clone());
        }
        let payload = self.resolve(chain, resolver.to_string(), arguments, depth + 1).await?;
        chain.state.memo.insert(memo_key, payload.clone());
        Ok(payload)
    }

    async fn dispatch(&self, chain: &Chain, operation: &Operation, arguments: &JsonMap<String, Value>) -> Result<Value, EngineError> {
        tokio::select! {
            biased;
            _ = chain.cancel.cancelled() => {
                warn!(operation = %operation.name, "call cancelled");
                Err(EngineError::Cancelled { operation: operation.name.clone() })
            }
            result = self.dispatcher.execute(operation, arguments, &chain.context) => result,
        }
    }
}

fn present_selectors<'r, 'v>(rule: &'r DependencyRule, arguments: &'v JsonMap<String, Value>) -> Vec<(&'r SelectorParam, &'v Value)> {
    rule.selector_params
        .iter()
        .filter_map(|selector| {
            arguments
                .get(&selector.name)
                .filter(|value| !value.is_null())
                .map(|value| (selector, value))
        })
        .collect()
}

/// Selector-free rules always apply; selector rules need one of their selectors supplied.
fn is_applicable(rule: &DependencyRule, arguments: &JsonMap<String, Value>) -> bool {
    !rule.has_selectors() || !present_selectors(rule, arguments).is_empty()
}

/// Selector rules whose selectors were supplied; selector-free rules only when
/// the caller named no entity.
fn ordered_rules<'r>(rules: &'r [DependencyRule], arguments: &JsonMap<String, Value>) -> Vec<&'r DependencyRule> {
    let keyed = rules
        .iter()
        .filter(|rule| rule.has_selectors() && is_applicable(rule, arguments))
        .collect::<Vec<_>>();
    if !keyed.is_empty() {
        return keyed;
    }
    rules.iter().filter(|rule| !rule.has_selectors()).collect()
}

fn resolver_arguments(
    rule: &DependencyRule,
    selectors: &[(&SelectorParam, &Value)],
    arguments: &JsonMap<String, Value>,
    resolved: &JsonMap<String, Value>,
) -> JsonMap<String, Value> {
    let mut resolver_arguments = JsonMap::new();
    for bind in &rule.binds {
        let source = resolved
            .get(&bind.from)
            .or_else(|| arguments.get(&bind.from))
            .filter(|value| !value.is_null());
        if let Some(value) = source {
            resolver_arguments.insert(bind.resolver_param.clone(), value.clone());
        }
    }
    for (selector, value) in selectors {
        if let Some(target) = &selector.forward_as {
            resolver_arguments.insert(target.clone(), (*value).clone());
        }
    }
    resolver_arguments
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn item_label(item: &Value, output_field: &str) -> String {
    select_path(item, Some(output_field))
        .as_ref()
        .and_then(scalar_text)
        .unwrap_or_else(|| item.to_string())
}

/// Pick the item the rule describes and read its output field.
fn select_value(
    rule: &DependencyRule,
    param: &str,
    payload: &Value,
    selectors: &[(&SelectorParam, &Value)],
) -> Result<Value, Selection> {
    let mut items = match &rule.collection_path {
        Some(path) => extract_collection_items(payload, Some(path))
            .ok_or_else(|| Selection::Miss(format!("returned no list at '{path}'")))?,
        None => match list_items(payload) {
            Some(items) => items,
            None if payload.is_object() => vec![payload.clone()],
            None => Vec::new(),
        },
    };

    let filters = selectors
        .iter()
        .filter(|(selector, _)| !selector.match_fields.is_empty())
        .filter_map(|(selector, value)| scalar_text(value).map(|text| (*selector, text)))
        .collect::<Vec<_>>();

    let item = if filters.is_empty() {
        match (items.len(), rule.selection) {
            (_, ItemSelection::Match) => {
                return Err(Selection::Miss("needs a selector value to match against".to_string()));
            }
            (0, _) => return Err(Selection::Miss("returned no items".to_string())),
            (1, _) | (_, ItemSelection::First) => items.swap_remove(0),
            (_, ItemSelection::Single) => {
                return Err(Selection::Ambiguous(EngineError::AmbiguousIdentifier {
                    param: param.to_string(),
                    value: None,
                    candidates: items.iter().map(|item| item_label(item, &rule.output_field)).collect(),
                }));
            }
        }
    } else {
        items.retain(|item| {
            filters.iter().all(|(selector, text)| {
                let wanted = text.to_lowercase();
                selector.match_fields.iter().any(|field| {
                    select_path(item, Some(field))
                        .as_ref()
                        .and_then(scalar_text)
                        .is_some_and(|candidate| candidate.to_lowercase() == wanted)
                })
            })
        });
        let (selector, text) = &filters[0];
        match items.len() {
            0 => {
                return Err(Selection::Miss(format!(
                    "has no item where {} matches {}='{text}'",
                    selector.match_fields.join(" or "),
                    selector.name
                )));
            }
            1 => items.swap_remove(0),
            _ => {
                return Err(Selection::Ambiguous(EngineError::AmbiguousIdentifier {
                    param: selector.name.clone(),
                    value: Some(text.clone()),
                    candidates: items.iter().map(|item| item_label(item, &rule.output_field)).collect(),
                }));
            }
        }
    };

    select_path(&item, Some(&rule.output_field))
        .filter(|value| !value.is_null())
        .ok_or_else(|| Selection::Miss(format!("returned an item without '{}'", rule.output_field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonMap<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn by_name_rule() -> DependencyRule {
        DependencyRule::new("account_id", "get_accounts", "id")
            .with_selector(SelectorParam::new("account_identifier").matching("name").matching("email"))
    }

    #[test]
    fn supplied_selectors_exclude_plain_rules_and_unsupplied_ones_drop_out() {
        let rules = vec![DependencyRule::new("account_id", "get_accounts", "id"), by_name_rule().with_collection_path("items")];
        let with_selector = ordered_rules(&rules, &object(json!({ "account_identifier": "Work" })));
        assert_eq!(with_selector.len(), 1);
        assert!(with_selector[0].has_selectors());

        let without = ordered_rules(&rules, &JsonMap::new());
        assert_eq!(without.len(), 1);
        assert!(!without[0].has_selectors());
    }

    #[test]
    fn matching_is_case_insensitive_across_fields() {
        let payload = json!([
            { "id": "acc_1", "name": "Personal Account", "email": "me@example.com" },
            { "id": "acc_2", "name": "Work", "email": "ME@work.example.com" }
        ]);
        let rule = by_name_rule();
        let value = json!("me@WORK.example.com");
        let selectors = vec![(&rule.selector_params[0], &value)];
        let selected = select_value(&rule, "account_id", &payload, &selectors);
        assert!(matches!(selected, Ok(ref id) if id == "acc_2"));
    }

    #[test]
    fn several_matches_are_ambiguous() {
        let payload = json!({ "items": [{ "id": "a", "name": "Shared" }, { "id": "b", "name": "shared" }] });
        let rule = by_name_rule();
        let value = json!("SHARED");
        let selectors = vec![(&rule.selector_params[0], &value)];
        match select_value(&rule, "account_id", &payload, &selectors) {
            Err(Selection::Ambiguous(EngineError::AmbiguousIdentifier { param, candidates, .. })) => {
                assert_eq!(param, "account_identifier");
                assert_eq!(candidates, vec!["a", "b"]);
            }
            _ => panic!("expected an ambiguous selection"),
        }
    }

    #[test]
    fn single_selection_rejects_multiple_items() {
        let rule = DependencyRule::new("account_id", "get_accounts", "id").with_selection(ItemSelection::Single);
        assert!(matches!(
            select_value(&rule, "account_id", &json!([{ "id": "a" }, { "id": "b" }]), &[]),
            Err(Selection::Ambiguous(_))
        ));
        assert!(matches!(select_value(&rule, "account_id", &json!([{ "id": "a" }]), &[]), Ok(ref id) if id == "a"));
    }

    #[test]
    fn match_selection_never_picks_without_a_selector() {
        let rule = by_name_rule().with_selection(ItemSelection::Match);
        let payload = json!([{ "id": "acc_1", "name": "Work" }, { "id": "acc_2", "name": "Home" }]);
        assert!(matches!(
            select_value(&rule, "account_id", &payload, &[]),
            Err(Selection::Miss(ref reason)) if reason.contains("selector value")
        ));

        let value = json!("home");
        let selectors = vec![(&rule.selector_params[0], &value)];
        assert!(matches!(select_value(&rule, "account_id", &payload, &selectors), Ok(ref id) if id == "acc_2"));

        let unknown = json!("Nobody");
        let selectors = vec![(&rule.selector_params[0], &unknown)];
        assert!(matches!(
            select_value(&rule, "account_id", &payload, &selectors),
            Err(Selection::Miss(ref reason)) if reason.contains("account_identifier='Nobody'")
        ));
    }

    #[test]
    fn single_objects_are_one_item_and_misses_are_reported() {
        let rule = DependencyRule::new("owner_id", "get_account", "owner.id");
        let payload = json!({ "id": "acc_1", "tags": ["x"], "owner": { "id": "u_9" } });
        assert!(matches!(select_value(&rule, "owner_id", &payload, &[]), Ok(ref id) if id == "u_9"));
        assert!(matches!(select_value(&rule, "owner_id", &json!([]), &[]), Err(Selection::Miss(_))));
        assert!(matches!(
            select_value(&rule, "owner_id", &json!([{ "id": "acc_1" }]), &[]),
            Err(Selection::Miss(ref reason)) if reason.contains("owner.id")
        ));
    }

    #[test]
    fn resolver_arguments_combine_binds_and_forwarded_selectors() {
        let rule = DependencyRule::new("folder_id", "get_folders", "id")
            .with_bind("account_id", "account_id")
            .with_bind("region", "region")
            .with_selector(SelectorParam::new("folder_name").forwarded_as("name"));
        let arguments = object(json!({ "folder_name": "Inbox", "region": null }));
        let resolved = object(json!({ "account_id": "acc_1" }));
        let selectors = present_selectors(&rule, &arguments);
        assert_eq!(
            Value::Object(resolver_arguments(&rule, &selectors, &arguments, &resolved)),
            json!({ "account_id": "acc_1", "name": "Inbox" })
        );
    }
}
