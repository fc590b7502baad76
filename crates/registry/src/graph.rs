//! Declarative dependency graph: missing parameter -> resolver rules.

use std::collections::{BTreeSet, HashMap};

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tether_types::{DependencyRule, ItemSelection, SelectorParam};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("an identical rule resolving '{target_param}' through '{resolver_operation}' is already declared")]
    ConflictingRule {
        target_param: String,
        resolver_operation: String,
    },
    #[error("invalid rule for '{target_param}': {reason}")]
    InvalidRule { target_param: String, reason: String },
}

/// Rules per target parameter, in preference order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    rules: IndexMap<String, Vec<DependencyRule>>,
    direct_patterns: HashMap<String, Regex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. A rule conflicts with an earlier one only when both
    /// resolve the same target through the same resolver keyed on the same
    /// selectors.
    pub fn add_rule(&mut self, rule: DependencyRule) -> Result<(), GraphError> {
        if rule.target_param.trim().is_empty() || rule.resolver_operation.trim().is_empty() {
            return Err(GraphError::InvalidRule {
                target_param: rule.target_param,
                reason: "target_param and resolver_operation must not be empty".to_string(),
            });
        }
        if rule.selection == ItemSelection::Match
            && !rule.selector_params.iter().any(|selector| !selector.match_fields.is_empty())
        {
            return Err(GraphError::InvalidRule {
                target_param: rule.target_param,
                reason: "selection 'match' needs a selector with match_fields".to_string(),
            });
        }
        let existing = self.rules.get(&rule.target_param).map(Vec::as_slice).unwrap_or_default();
        if existing.iter().any(|declared| {
            declared.resolver_operation == rule.resolver_operation && selector_names(declared) == selector_names(&rule)
        }) {
            return Err(GraphError::ConflictingRule {
                target_param: rule.target_param,
                resolver_operation: rule.resolver_operation,
            });
        }

        let mut compiled = Vec::new();
        for pattern in rule.selector_params.iter().filter_map(|selector| selector.direct_pattern.as_ref()) {
            if self.direct_patterns.contains_key(pattern) {
                continue;
            }
            let regex = Regex::new(pattern).map_err(|error| GraphError::InvalidRule {
                target_param: rule.target_param.clone(),
                reason: format!("direct_pattern '{pattern}' is not a valid regular expression: {error}"),
            })?;
            compiled.push((pattern.clone(), regex));
        }
        self.direct_patterns.extend(compiled);
        self.rules.entry(rule.target_param.clone()).or_default().push(rule);
        Ok(())
    }

    /// Rules able to produce `target_param`, in declaration order. Empty when none exist.
    pub fn rules_for(&self, target_param: &str) -> &[DependencyRule] {
        self.rules.get(target_param).map(Vec::as_slice).unwrap_or_default()
    }

    /// Distinct resolver operations declared for `target_param`, in rule order.
    pub fn resolvers_for(&self, target_param: &str) -> Vec<String> {
        self.rules_for(target_param)
            .iter()
            .map(|rule| rule.resolver_operation.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether a selector value already is a normalized id.
    pub fn is_direct_match(&self, selector: &SelectorParam, value: &str) -> bool {
        selector
            .direct_pattern
            .as_ref()
            .and_then(|pattern| self.direct_patterns.get(pattern))
            .is_some_and(|regex| regex.is_match(value))
    }

    /// All rules, grouped by target parameter.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DependencyRule])> {
        self.rules.iter().map(|(target, rules)| (target.as_str(), rules.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn selector_names(rule: &DependencyRule) -> BTreeSet<&str> {
    rule.selector_params.iter().map(|selector| selector.name.as_str()).collect()
}
