//! Transport-independent JSON-RPC handling.

use std::sync::Arc;

use serde_json::Value;

use eve_core::EveCore;
use eve_domain::tool::ToolCall;

use crate::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpToolDef,
    ReadResourceParams, ResourceTemplatesListResult, ResourcesListResult, ToolCallParams,
    ToolCallResult, ToolsListResult, INTERNAL_ERROR, INVALID_REQUEST,
};
use crate::{resources, tools};

#[derive(Clone)]
pub struct McpServer {
    core: Arc<EveCore>,
}

impl McpServer {
    pub fn new(core: Arc<EveCore>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Arc<EveCore> {
        &self.core
    }

    /// Handle one raw message. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e))),
            Ok(value) => self.handle_value(value).await,
        }?;
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    /// Handle an already-parsed message.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.handle(req).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
            )),
        }
    }

    pub async fn handle(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if req.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                req.id.unwrap_or(Value::Null),
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        let Some(id) = req.id.clone() else {
            tracing::debug!(method = %req.method, "notification");
            return None;
        };

        let result = match req.method.as_str() {
            "initialize" => to_value(InitializeResult::current()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => {
                let tools = tools::build_tool_definitions()
                    .into_iter()
                    .map(McpToolDef::from)
                    .collect();
                to_value(ToolsListResult { tools })
            }
            "tools/call" => self.call_tool(req.params).await,
            "resources/list" => to_value(ResourcesListResult {
                resources: resources::list_resources(),
            }),
            "resources/templates/list" => to_value(ResourceTemplatesListResult {
                resource_templates: resources::list_templates(),
            }),
            "resources/read" => self.read_resource(req.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(JsonRpcError::invalid_params)?;
        let call = ToolCall {
            tool_name: params.name,
            arguments: params.arguments.unwrap_or(Value::Null),
        };
        tracing::debug!(tool = %call.tool_name, "tools/call");

        match tools::dispatch_tool(&self.core, &call).await {
            Ok(output) => to_value(ToolCallResult::from(output)),
            Err(e) => Err(JsonRpcError::invalid_params(e)),
        }
    }

    async fn read_resource(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ReadResourceParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(JsonRpcError::invalid_params)?;
        tracing::debug!(uri = %params.uri, "resources/read");
        to_value(resources::read(&self.core, &params.uri).await?)
    }
}

fn to_value<T: serde::Serialize>(val: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(val).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}
