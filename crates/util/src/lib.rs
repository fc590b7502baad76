//! Utility helpers shared by the registry, the engine, and the protocol surfaces.

use once_cell::sync::Lazy;
use regex::Regex;

pub mod http;
pub mod path_processing;
pub mod payload;

pub use http::{
    HttpCallError, JsonParseError, build_path, build_query_pairs, execute_http_json_request, parse_response_json_strict,
    status_error_message,
};
pub use path_processing::expand_tilde;
pub use payload::{TruncatedPayload, extract_collection_items, list_items, select_path, truncate_collection};

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )((?:bearer )?[\w\-\.=:/+]+)",
        r"(?i)(bearer )([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r#"(?i)("(?:[a-z0-9_]*?)(?:token|secret|password)"\s*:\s*)("[^"]*")"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &regex::Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}<redacted>")
            })
            .to_string();
    }
    redacted
}
