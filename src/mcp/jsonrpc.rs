//! JSON-RPC 2.0 types for MCP communication

use serde::Serialize;
use serde_json::Value;

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;

/// An incoming message after shape checks
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Has `method` and a non-null `id`; gets exactly one response
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    /// Has `method` but no `id`; never answered
    Notification { method: String, params: Value },
}

impl Incoming {
    /// Classify a parsed JSON value.
    ///
    /// An absent or `null` id makes a notification. Anything that is not an
    /// object with a string `method` is rejected with `-32600`, echoing the id
    /// when one can be read.
    pub fn classify(message: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(mut fields) = message else {
            return Err(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                "Invalid Request: expected a JSON object".to_string(),
            ));
        };

        let id = fields.remove("id").unwrap_or(Value::Null);
        let params = fields.remove("params").unwrap_or(Value::Null);

        let method = match fields.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    "Invalid Request: method must be a string".to_string(),
                ))
            }
            None => {
                return Err(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    "Invalid Request: missing method".to_string(),
                ))
            }
        };

        if id.is_null() {
            Ok(Incoming::Notification { method, params })
        } else {
            Ok(Incoming::Request { id, method, params })
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create an error response with auxiliary data
    pub fn error_with_data(id: Value, code: i64, message: String, data: Value) -> Self {
        let mut response = Self::error(id, code, message);
        if let Some(error) = response.error.as_mut() {
            error.data = Some(data);
        }
        response
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }
}
