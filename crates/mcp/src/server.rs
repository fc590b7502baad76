use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde_json::{Value, json};
use tether_engine::Gateway;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::schemas::CallRequest;

const INSTRUCTIONS: &str = "Call list_operations first. Each description says which parameters are resolved automatically and which selector aliases are accepted. Then call `call` with the operation name and only the arguments you know. Failed calls return an error kind, a message and guidance naming the next step.";

#[derive(Clone)]
pub struct TetherMcpServer {
    gateway: Arc<Gateway>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TetherMcpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Invoke an operation or intent by name. Required parameters that the caller omits are resolved through dependency rules before the call. Returns ok, payload, resolved_arguments and truncation, or an error with kind, message, details and guidance."
    )]
    async fn call(&self, param: Parameters<CallRequest>, context: RequestContext<RoleServer>) -> Result<CallToolResult, ErrorData> {
        Ok(self.run_call(param.0, &context.ct).await)
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List callable operations and intents with their input schemas and dependency hints."
    )]
    async fn list_operations(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.describe())
    }

    async fn run_call(&self, request: CallRequest, cancel: &CancellationToken) -> CallToolResult {
        debug!(operation = %request.operation, "mcp call");
        let outcome = self
            .gateway
            .call_with_cancel(&request.operation, request.arguments.unwrap_or_default(), cancel)
            .await;
        if outcome.ok {
            CallToolResult::structured(outcome.to_value())
        } else {
            CallToolResult::structured_error(outcome.to_value())
        }
    }

    fn describe(&self) -> CallToolResult {
        let operations = self.gateway.list_operations();
        CallToolResult::structured(json!({
            "operations": serde_json::to_value(&operations).unwrap_or(Value::Null)
        }))
    }
}

#[tool_handler]
impl ServerHandler for TetherMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "Tether".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Tether MCP".to_string()),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

/// Serve the gateway over stdin/stdout until the client disconnects.
pub async fn serve_stdio(gateway: Arc<Gateway>) -> Result<()> {
    info!("mcp stdio server starting");
    let service = TetherMcpServer::new(gateway)
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to initialize MCP session")?;
    let reason = service.waiting().await.context("MCP session task failed")?;
    info!(reason = ?reason, "mcp stdio server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tether_engine::{Dispatcher, FixtureBackend, ResolutionEngine};
    use tether_registry::CatalogStore;
    use tether_types::{CatalogManifest, ExecutionContext};

    fn server(backend: FixtureBackend) -> TetherMcpServer {
        let manifest: CatalogManifest = serde_json::from_value(json!({
            "operations": [
                { "name": "get_accounts", "method": "GET", "path": "/accounts" },
                {
                    "name": "get_mails",
                    "method": "GET",
                    "path": "/accounts/{account_id}/mails",
                    "params": [{ "name": "account_id", "type": "string", "required": true }]
                },
                {
                    "name": "get_label",
                    "method": "GET",
                    "path": "/labels/{label_id}",
                    "params": [{ "name": "label_id", "type": "string", "required": true }]
                }
            ],
            "rules": [{ "target_param": "account_id", "resolver_operation": "get_accounts", "output_field": "id" }]
        }))
        .expect("manifest");
        let store = Arc::new(CatalogStore::from_manifest(manifest).expect("store"));
        let engine = ResolutionEngine::new(Dispatcher::new(Arc::new(backend), Duration::from_secs(5)));
        TetherMcpServer::new(Arc::new(Gateway::new(store, engine, ExecutionContext::new(), 50)))
    }

    fn request(operation: &str, arguments: Value) -> CallRequest {
        CallRequest {
            operation: operation.to_string(),
            arguments: arguments.as_object().cloned(),
        }
    }

    #[tokio::test]
    async fn call_tool_returns_structured_payload() {
        let backend = FixtureBackend::new()
            .with_response("get_accounts", json!([{ "id": "acc_1" }]))
            .with_response("get_mails", json!([{ "subject": "hello" }]));
        let result = server(backend)
            .run_call(request("get_mails", json!({})), &CancellationToken::new())
            .await;

        assert_ne!(result.is_error, Some(true));
        let structured = result.structured_content.expect("structured content");
        assert_eq!(structured["ok"], json!(true));
        assert_eq!(structured["resolved_arguments"]["account_id"], json!("acc_1"));
        assert_eq!(structured["payload"][0]["subject"], json!("hello"));
    }

    #[tokio::test]
    async fn failed_call_is_flagged_as_tool_error() {
        let result = server(FixtureBackend::new())
            .run_call(request("get_label", json!({})), &CancellationToken::new())
            .await;

        assert_eq!(result.is_error, Some(true));
        let structured = result.structured_content.expect("structured content");
        assert_eq!(structured["error"]["kind"], json!("unresolved_dependency"));
        assert_eq!(structured["error"]["details"]["missing"], json!(["label_id"]));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_call() {
        let backend = FixtureBackend::new().with_response("get_accounts", json!([{ "id": "acc_1" }]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = server(backend).run_call(request("get_mails", json!({})), &cancel).await;

        let structured = result.structured_content.expect("structured content");
        assert_eq!(structured["error"]["kind"], json!("cancelled"));
    }

    #[test]
    fn list_operations_reports_dependency_hints() {
        let result = server(FixtureBackend::new()).describe();
        let structured = result.structured_content.expect("structured content");
        let operations = structured["operations"].as_array().expect("operations");
        assert_eq!(operations.len(), 3);
        let mails = operations.iter().find(|entry| entry["name"] == "get_mails").expect("get_mails");
        assert!(mails["description"].as_str().is_some_and(|text| text.contains("'get_accounts'")));
        assert_eq!(mails["input_schema"]["required"], json!([]));
    }

    #[test]
    fn server_info_enables_tools() {
        let info = server(FixtureBackend::new()).get_info();
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, "Tether");
    }
}
