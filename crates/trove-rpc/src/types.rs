//! Request and response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes;

/// Protocol version tag carried by requests and the handshake result.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Incoming request envelope.
///
/// `id` is caller-supplied and echoed verbatim in the paired response;
/// the server does not require it to be unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "protocolVersion", skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Outgoing response envelope: exactly one of `result` or `error`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body inside an [`RpcResponse`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Build an error response with structured diagnostic data.
    pub fn error_with_data(
        id: Value,
        code: i32,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }

    /// Parse failure; no id is available from an unparseable body.
    pub fn parse_error() -> Self {
        Self::error(Value::Null, codes::PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, codes::INVALID_PARAMS, message)
    }

    pub fn internal_error(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, codes::INTERNAL_ERROR, message)
    }

    /// The stream-path lookup miss: the referenced session is not in the
    /// registry. Never auto-creates one.
    pub fn session_not_found(id: Value) -> Self {
        Self::error(id, codes::RESOURCE_NOT_FOUND, "Connection not found")
    }

    /// The numeric error code, when this is an error response.
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl RpcRequest {
    /// The request id as echoed in responses (`null` when absent).
    pub fn response_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}
