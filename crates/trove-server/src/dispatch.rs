//! Method dispatch.
//!
//! Resolves a request envelope to a handler over a closed method set and
//! always produces a response envelope — provider failures are wrapped,
//! never propagated as faults.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use trove_core::{catalog, ProviderError, ResourceProvider, ToolKind, DEFAULT_RESULT_LIMIT};
use trove_rpc::codes;
use trove_rpc::params::{optional_usize, require_str};
use trove_rpc::{RpcRequest, RpcResponse, PROTOCOL_VERSION};

/// Dispatch a request to the appropriate handler.
pub async fn dispatch(provider: &Arc<dyn ResourceProvider>, request: RpcRequest) -> RpcResponse {
    let id = request.response_id();
    debug!(method = %request.method, "dispatching request");

    match request.method.as_str() {
        "handshake/initialize" => RpcResponse::success(id, initialize_result()),
        "handshake/ack" => RpcResponse::success(id, json!({})),
        "catalog/list" => RpcResponse::success(id, json!({ "tools": catalog() })),
        "tool/invoke" => invoke_tool(provider, id, request.params).await,
        other => RpcResponse::method_not_found(id, other),
    }
}

/// Static capability/version descriptor returned by the handshake.
fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": "trove",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {},
        },
    })
}

async fn invoke_tool(
    provider: &Arc<dyn ResourceProvider>,
    id: Value,
    params: Option<Value>,
) -> RpcResponse {
    let Some(params) = params else {
        return RpcResponse::invalid_params(id, "Missing params for tool/invoke");
    };
    let name = match require_str(&params, "name") {
        Ok(name) => name,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let Some(kind) = ToolKind::from_name(name) else {
        return RpcResponse::error(id, codes::METHOD_NOT_FOUND, format!("Unknown tool: {name}"));
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let outcome = match kind {
        ToolKind::SearchResources => {
            let query = match require_str(&arguments, "query") {
                Ok(q) => q,
                Err(e) => return RpcResponse::invalid_params(id, e),
            };
            let limit = optional_usize(&arguments, "limit").unwrap_or(DEFAULT_RESULT_LIMIT);
            provider
                .search(query, limit)
                .await
                .and_then(|hits| to_json(&hits))
        }
        ToolKind::BrowseCategories => provider
            .categories()
            .await
            .and_then(|cats| to_json(&cats)),
        ToolKind::FilterResources => {
            let category = match require_str(&arguments, "category") {
                Ok(c) => c,
                Err(e) => return RpcResponse::invalid_params(id, e),
            };
            let limit = optional_usize(&arguments, "limit").unwrap_or(DEFAULT_RESULT_LIMIT);
            provider
                .by_category(category, limit)
                .await
                .and_then(|hits| to_json(&hits))
        }
    };

    match outcome {
        Ok(value) => RpcResponse::success(id, tool_content(&value)),
        Err(err) => provider_error_response(id, kind.name(), &err),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(value).map_err(|e| ProviderError::Catalog(e.to_string()))
}

/// Wrap a provider result as textual content.
fn tool_content(value: &Value) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({
        "content": [{
            "type": "text",
            "text": text,
        }]
    })
}

/// Map a provider failure to a response envelope. The provider message
/// is always retained as diagnostic data.
fn provider_error_response(id: Value, tool: &str, err: &ProviderError) -> RpcResponse {
    let data = json!({
        "tool": tool,
        "kind": err.error_kind(),
        "message": err.to_string(),
    });
    match err {
        ProviderError::InvalidArguments(message) => {
            RpcResponse::error_with_data(id, codes::INVALID_PARAMS, message.clone(), data)
        }
        ProviderError::NotFound(message) => {
            RpcResponse::error_with_data(id, codes::RESOURCE_NOT_FOUND, message.clone(), data)
        }
        ProviderError::RateLimited => {
            RpcResponse::error_with_data(id, codes::RATE_LIMITED, "Rate limited", data)
        }
        ProviderError::Upstream { .. } | ProviderError::Network(_) | ProviderError::Catalog(_) => {
            RpcResponse::error_with_data(id, codes::INTERNAL_ERROR, "Tool execution failed", data)
        }
    }
}
