use serde::{Deserialize, Serialize};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a method call with no `id` and, by definition,
/// no response. Gateway-side, notifications skip retry and circuit-breaker
/// accounting but still honor backpressure admission (resolved Open Question,
/// see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_without_id_field() {
        let n = JsonRpcNotification::new("notifications/initialized", None);
        let value = serde_json::to_value(&n).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value.get("method").unwrap(), "notifications/initialized");
    }
}
