use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map as JsonMap, Value};
use tether_api::ApiClient;
use tether_types::{ExecutionContext, Operation};
use tether_util::{build_path, execute_http_json_request};

use super::{Backend, BackendFailure};

/// Backend that performs the operation's HTTP binding.
///
/// Path placeholders are filled from the arguments; the remaining arguments
/// travel as query pairs (GET/DELETE) or as a JSON body.
#[derive(Debug)]
pub struct HttpBackend {
    base_url: Option<String>,
    timeout: Duration,
    clients: Mutex<HashMap<String, ApiClient>>,
}

impl HttpBackend {
    /// `base_url` is used for operations whose binding carries none.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, base_url: &str) -> Result<ApiClient, BackendFailure> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(base_url) {
            return Ok(client.clone());
        }
        let client = ApiClient::new(base_url, self.timeout).map_err(|error| BackendFailure::new(None, format!("{error:#}")))?;
        clients.insert(base_url.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn execute(
        &self,
        operation: &Operation,
        arguments: &JsonMap<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value, BackendFailure> {
        let base_url = operation
            .binding
            .base_url
            .as_deref()
            .or(self.base_url.as_deref())
            .ok_or_else(|| BackendFailure::new(None, format!("no base URL configured for '{}'", operation.name)))?;
        let client = self.client_for(base_url)?;
        let method = Method::from_bytes(operation.binding.method.as_bytes())
            .map_err(|_| BackendFailure::new(None, format!("invalid HTTP method '{}'", operation.binding.method)))?;

        let path = build_path(&operation.binding.path, arguments);
        let path_params = operation.binding.path_params();
        let remaining = arguments
            .iter()
            .filter(|(name, _)| !path_params.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        execute_http_json_request(&client, context, method, &path, remaining)
            .await
            .map_err(|error| BackendFailure::new(error.status(), error.to_string()))
    }
}
