//! Declarative dependency rules.
//!
//! A [`DependencyRule`] says that a missing parameter can be produced by calling
//! another operation (the resolver) and picking a field out of its result. The
//! shape mirrors a value provider: the resolver is identified by name, its own
//! inputs can be bound from the caller's arguments, and the value is selected
//! from the returned collection.

use serde::{Deserialize, Serialize};

/// Declares how a missing parameter can be produced by another operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRule {
    /// Parameter that may be missing on the requesting operation
    pub target_param: String,
    /// Operation whose result supplies the value
    pub resolver_operation: String,
    /// Field of the selected result item that supplies the value (dotted path)
    pub output_field: String,
    /// Dotted path to the list inside the resolver result, for example `items`.
    ///
    /// When absent, list-like payloads are detected automatically.
    #[serde(default)]
    pub collection_path: Option<String>,
    /// How an item is chosen once the collection is filtered
    #[serde(default)]
    pub selection: ItemSelection,
    /// Alternate caller-supplied identifiers the rule understands
    #[serde(default)]
    pub selector_params: Vec<SelectorParam>,
    /// Resolver inputs sourced from the caller's arguments
    #[serde(default)]
    pub binds: Vec<Bind>,
}

impl DependencyRule {
    pub fn new(target_param: impl Into<String>, resolver_operation: impl Into<String>, output_field: impl Into<String>) -> Self {
        Self {
            target_param: target_param.into(),
            resolver_operation: resolver_operation.into(),
            output_field: output_field.into(),
            collection_path: None,
            selection: ItemSelection::First,
            selector_params: Vec::new(),
            binds: Vec::new(),
        }
    }

    pub fn with_collection_path(mut self, path: impl Into<String>) -> Self {
        self.collection_path = Some(path.into());
        self
    }

    pub fn with_selection(mut self, selection: ItemSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_selector(mut self, selector: SelectorParam) -> Self {
        self.selector_params.push(selector);
        self
    }

    pub fn with_bind(mut self, resolver_param: impl Into<String>, from: impl Into<String>) -> Self {
        self.binds.push(Bind {
            resolver_param: resolver_param.into(),
            from: from.into(),
        });
        self
    }

    /// True when the rule is keyed on alternate identifiers.
    pub fn has_selectors(&self) -> bool {
        !self.selector_params.is_empty()
    }
}

/// Selection strategy applied to the resolver's collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSelection {
    /// Take the first item.
    #[default]
    First,
    /// Require exactly one item; more than one is ambiguous.
    Single,
    /// Pick only through a supplied selector value; never defaults to an item.
    Match,
}

/// A caller-friendly identifier accepted in place of the normalized id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorParam {
    /// Argument key on the caller side (for example `account_identifier`)
    pub name: String,
    /// Resolver item fields compared against the selector value
    #[serde(default)]
    pub match_fields: Vec<String>,
    /// Resolver parameter that receives the selector value
    #[serde(default)]
    pub forward_as: Option<String>,
    /// Regular expression identifying values that already are normalized ids
    #[serde(default)]
    pub direct_pattern: Option<String>,
}

impl SelectorParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            match_fields: Vec::new(),
            forward_as: None,
            direct_pattern: None,
        }
    }

    pub fn matching(mut self, field: impl Into<String>) -> Self {
        self.match_fields.push(field.into());
        self
    }

    pub fn forwarded_as(mut self, resolver_param: impl Into<String>) -> Self {
        self.forward_as = Some(resolver_param.into());
        self
    }

    pub fn direct_when(mut self, pattern: impl Into<String>) -> Self {
        self.direct_pattern = Some(pattern.into());
        self
    }
}

/// Maps a resolver's input key to a field of the caller's argument set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    /// The resolver's parameter name
    pub resolver_param: String,
    /// Caller argument (or already resolved parameter) providing the value
    pub from: String,
}
