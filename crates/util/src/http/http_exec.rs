//! HTTP execution helpers used by the engine's HTTP backend.

use std::time::Instant;

use reqwest::Method;
use serde_json::{Map, Value};
use tether_api::ApiClient;
use tether_types::ExecutionContext;
use thiserror::Error;
use tracing::{debug, warn};

use super::parser::{JsonParseError, parse_response_json_strict, status_error_message};
use crate::redact_sensitive;

/// Failure modes of a single outbound JSON request.
#[derive(Debug, Error)]
pub enum HttpCallError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(String),
    /// The server answered with a body that is not JSON.
    #[error(transparent)]
    Parse(#[from] JsonParseError),
}

impl HttpCallError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Execute a JSON-backed HTTP request and parse the response payload.
///
/// `parameters` travel as query pairs for GET/DELETE and as a JSON object
/// body for every other method. An empty response body yields `Value::Null`.
pub async fn execute_http_json_request(
    client: &ApiClient,
    context: &ExecutionContext,
    method: Method,
    request_path: &str,
    parameters: Map<String, Value>,
) -> Result<Value, HttpCallError> {
    let start = Instant::now();
    debug!(
        method = %method,
        path = %request_path,
        parameter_count = parameters.len(),
        "http request started"
    );
    let mut request_builder = client.request_in(context, method.clone(), request_path);

    match method {
        Method::GET | Method::DELETE => {
            if !parameters.is_empty() {
                request_builder = request_builder.query(&build_query_pairs(parameters));
            }
        }
        _ => {
            request_builder = request_builder.json(&Value::Object(parameters));
        }
    }

    let response = request_builder
        .send()
        .await
        .map_err(|error| HttpCallError::Transport(error.to_string()))?;
    let status = response.status();
    let body_text = response
        .text()
        .await
        .map_err(|error| HttpCallError::Transport(error.to_string()))?;

    if !status.is_success() {
        let body = redact_sensitive(&body_text);
        warn!(
            method = %method,
            path = %request_path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "http request failed"
        );
        let body = match status_error_message(status.as_u16()) {
            Some(hint) if body.trim().is_empty() => hint,
            Some(hint) => format!("{body}\n{hint}"),
            None => body,
        };
        return Err(HttpCallError::Status {
            status: status.as_u16(),
            body,
        });
    }

    if body_text.trim().is_empty() {
        debug!(
            method = %method,
            path = %request_path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "http request completed with empty response"
        );
        return Ok(Value::Null);
    }

    let parsed = parse_response_json_strict(&body_text, Some(status)).inspect_err(|error| {
        warn!(
            method = %method,
            path = %request_path,
            status = %status,
            body_len = body_text.len(),
            error = %error,
            "http response JSON parse failed"
        );
    })?;
    debug!(
        method = %method,
        path = %request_path,
        status = %status,
        duration_ms = start.elapsed().as_millis(),
        "http request completed"
    );
    Ok(parsed)
}

/// Flatten a parameter map into query pairs; arrays repeat their key.
pub fn build_query_pairs(parameters: Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in parameters {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), query_value_to_string(item)));
                }
            }
            Value::Null => {}
            other => pairs.push((key, query_value_to_string(other))),
        }
    }
    pairs
}

fn query_value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_repeat_array_keys_and_skip_nulls() {
        let parameters = json!({ "tag": ["a", "b"], "limit": 5, "cursor": null, "q": "mail" });
        let pairs = build_query_pairs(parameters.as_object().cloned().expect("object"));
        assert_eq!(
            pairs,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("limit".to_string(), "5".to_string()),
                ("q".to_string(), "mail".to_string()),
            ]
        );
    }
}
