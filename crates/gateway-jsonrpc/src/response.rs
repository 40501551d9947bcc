use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcErrorObject;
use crate::types::{JsonRpcVersion, RequestId};

/// The successful payload of a JSON-RPC response. Handlers return arbitrary
/// `Value` results; the gateway never imposes a result schema of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseResult {
    Value(Value),
}

impl ResponseResult {
    pub fn into_value(self) -> Value {
        match self {
            ResponseResult::Value(v) => v,
        }
    }
}

impl From<Value> for ResponseResult {
    fn from(value: Value) -> Self {
        ResponseResult::Value(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: ResponseResult,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: impl Into<ResponseResult>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result: result.into(),
        }
    }
}

/// The union of what the router may write back to the wire for a single
/// request: a success response or an error envelope. Notifications never
/// produce a `JsonRpcMessage` at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Response(JsonRpcResponse),
    Error(crate::error::JsonRpcError),
}

impl JsonRpcMessage {
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => e.id.as_ref(),
        }
    }

    pub fn success(id: RequestId, result: impl Into<ResponseResult>) -> Self {
        JsonRpcMessage::Response(JsonRpcResponse::new(id, result))
    }

    pub fn failure(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        JsonRpcMessage::Error(crate::error::JsonRpcError::new(id, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_message_serializes_without_error_field() {
        let msg = JsonRpcMessage::success(RequestId::Number(1), json!({"ok": true}));
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("result").is_some());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_message_echoes_id() {
        let msg = JsonRpcMessage::failure(
            Some(RequestId::String("req-1".into())),
            JsonRpcErrorObject::method_not_found("tools/nope"),
        );
        assert_eq!(msg.id(), Some(&RequestId::String("req-1".into())));
    }
}
