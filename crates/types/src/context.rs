use std::fmt;

use indexmap::IndexMap;

/// Opaque credential/session material threaded through every backend call.
///
/// The engine never inspects these headers; only the backend applies them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    headers: IndexMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying an `Authorization: Bearer <token>` header.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::default().with_header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_header_values() {
        let context = ExecutionContext::bearer("s3cr3t");
        let rendered = format!("{context:?}");
        assert!(rendered.contains("Authorization"));
        assert!(!rendered.contains("s3cr3t"));
        assert_eq!(context.headers().next(), Some(("Authorization", "Bearer s3cr3t")));
    }
}
