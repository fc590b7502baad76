//! Registry of invocable operations.

use indexmap::IndexMap;
use tether_types::Operation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
}

/// Operations keyed by name, iterated in registration order.
#[derive(Debug, Clone, Default)]
pub struct OperationCatalog {
    operations: IndexMap<String, Operation>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: Operation) -> Result<(), CatalogError> {
        if self.operations.contains_key(&operation.name) {
            return Err(CatalogError::DuplicateOperation(operation.name));
        }
        self.operations.insert(operation.name.clone(), operation);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Operation, CatalogError> {
        self.operations
            .get(name)
            .ok_or_else(|| CatalogError::UnknownOperation(name.to_string()))
    }

    /// Every operation in registration order. The iterator is cheap to clone
    /// and can be restarted by calling `all()` again.
    pub fn all(&self) -> impl Iterator<Item = &Operation> + Clone {
        self.operations.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::{ExecutionBinding, OperationRole};

    fn operation(name: &str) -> Operation {
        Operation {
            name: name.to_string(),
            summary: String::new(),
            required_params: Default::default(),
            optional_params: Default::default(),
            param_types: Default::default(),
            role: OperationRole::Fetch,
            binding: ExecutionBinding::new("GET", format!("/{name}")),
        }
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut catalog = OperationCatalog::new();
        catalog.register(operation("get_accounts")).expect("first registration");
        let error = catalog.register(operation("get_accounts")).expect_err("duplicate");
        assert_eq!(error, CatalogError::DuplicateOperation("get_accounts".into()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn lookup_reports_unknown_names() {
        let catalog = OperationCatalog::new();
        assert!(catalog.is_empty());
        assert_eq!(
            catalog.lookup("nope").expect_err("unknown"),
            CatalogError::UnknownOperation("nope".into())
        );
    }

    #[test]
    fn all_is_restartable_and_ordered() {
        let mut catalog = OperationCatalog::new();
        for name in ["c", "a", "b"] {
            catalog.register(operation(name)).expect("register");
        }
        let names = || catalog.all().map(|op| op.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names(), vec!["c", "a", "b"]);
        assert_eq!(names(), vec!["c", "a", "b"]);
        assert!(catalog.contains("a"));
    }
}
