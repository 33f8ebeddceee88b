//! Wire protocol types
//!
//! JSON-RPC 2.0 messages as used by the proxied endpoint, exchanged as
//! newline-delimited JSON over TCP. The proxy does not define its own
//! protocol; it wraps this one and only rewrites remote-object handles
//! on the way through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proxy::Handle;

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Key marking a value as a remote-object reference on the wire
pub const REF_KEY: &str = "$ref";

/// JSON-RPC request
///
/// `object` addresses a previously returned remote-object handle;
/// absent means the call targets the root object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            object: None,
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_object(mut self, handle: &Handle) -> Self {
        self.object = Some(handle.as_str().to_string());
        self
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFault>,
}

impl RpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn fault(id: RequestId, fault: RpcFault) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(fault),
        }
    }
}

/// Request ID (can be string, number, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Failure descriptor raised by the real endpoint
///
/// Passes through the proxy unchanged; the proxy records it but never
/// rewrites or suppresses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcFault {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcFault {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid request")
    }

    /// Infrastructure fault raised by the proxy itself, distinct from
    /// any code the real endpoint would use.
    pub fn proxy_error(message: impl Into<String>) -> Self {
        Self::new(-32050, message)
    }
}

/// Extract the remote-object handle from a `{"$ref": "..."}` value.
pub fn as_remote_ref(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(REF_KEY).and_then(Value::as_str),
        _ => None,
    }
}

/// Build a `{"$ref": "..."}` value for a handle.
pub fn remote_ref(handle: &str) -> Value {
    serde_json::json!({ REF_KEY: handle })
}

/// JSON type descriptor for an argument value, recorded alongside the
/// arguments themselves.
pub fn type_descriptor(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_f64() {
                "number"
            } else {
                "integer"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(map) => {
            if map.len() == 1 && map.contains_key(REF_KEY) {
                "remote-ref"
            } else {
                "object"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = RpcRequest::new(1i64, "login");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"login\""));
        assert!(!json.contains("\"object\""));
    }

    #[test]
    fn test_request_with_object_routing() {
        let handle = Handle::new("h-1");
        let req = RpcRequest::new(2i64, "next").with_object(&handle);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["object"], "h-1");
    }

    #[test]
    fn test_response_success() {
        let resp = RpcResponse::success(RequestId::Number(1), serde_json::json!({"ok": true}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_response_fault() {
        let resp = RpcResponse::fault(RequestId::Number(1), RpcFault::new(401, "bad password"));
        assert!(resp.result.is_none());
        assert_eq!(resp.error.as_ref().unwrap().code, 401);
    }

    #[test]
    fn test_fault_roundtrip_unchanged() {
        let fault = RpcFault {
            code: -1,
            message: "auth failed".to_string(),
            data: Some(serde_json::json!({"kind": "AuthenticationError"})),
        };
        let json = serde_json::to_string(&fault).unwrap();
        let back: RpcFault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }

    #[test]
    fn test_remote_ref_detection() {
        let v = remote_ref("obj-7");
        assert_eq!(as_remote_ref(&v), Some("obj-7"));

        // A plain object with other keys is not a reference
        let plain = serde_json::json!({"$ref": "x", "extra": 1});
        assert_eq!(as_remote_ref(&plain), None);
        assert_eq!(as_remote_ref(&serde_json::json!("obj-7")), None);
    }

    #[test]
    fn test_type_descriptors() {
        assert_eq!(type_descriptor(&serde_json::json!(42)), "integer");
        assert_eq!(type_descriptor(&serde_json::json!(1.5)), "number");
        assert_eq!(type_descriptor(&serde_json::json!("hi")), "string");
        assert_eq!(type_descriptor(&remote_ref("h")), "remote-ref");
    }
}
