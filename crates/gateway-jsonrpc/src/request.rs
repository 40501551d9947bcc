use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request: positional array or named object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl RequestParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Object(map) => map.is_empty(),
            RequestParams::Array(vec) => vec.is_empty(),
        }
    }

    /// Convert to a `serde_json::Value` for handler-side typed deserialization.
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(map: HashMap<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

/// A parsed JSON-RPC 2.0 request. The envelope carries `id: Option<RequestId>`
/// at the wire boundary because a notification has no
/// `id` field at all; `JsonRpcEnvelope` is what's actually deserialized from
/// the wire, and `JsonRpcRequest` is the normalized, addressable form used
/// once the router has decided this is not a notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcEnvelope {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcEnvelope {
    /// A request with no `id` field present is a notification per JSON-RPC
    /// 2.0.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    pub method: String,
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: String, params: Option<RequestParams>) -> Self {
        Self { id, method, params }
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_without_id_is_notification() {
        let raw = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let envelope: JsonRpcEnvelope = serde_json::from_value(raw).unwrap();
        assert!(envelope.is_notification());
    }

    #[test]
    fn envelope_with_null_id_is_not_a_notification() {
        // A present-but-null id is a request awaiting a null-id response,
        // distinct from an absent id
        let raw = json!({"jsonrpc": "2.0", "id": null, "method": "ping"});
        let envelope: JsonRpcEnvelope = serde_json::from_value(raw).unwrap();
        assert!(!envelope.is_notification());
        assert_eq!(envelope.id, Some(RequestId::Null));
    }

    #[test]
    fn object_params_lookup_by_name() {
        let params = RequestParams::Object(HashMap::from([("name".to_string(), json!("weather"))]));
        assert_eq!(params.get("name"), Some(&json!("weather")));
        assert_eq!(params.get("missing"), None);
    }
}
