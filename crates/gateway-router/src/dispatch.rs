use gateway_jsonrpc::request::RequestParams;
use serde_json::Value;
use std::collections::HashMap;

/// What step 5 (dispatch) actually does with the selected adapter, derived
/// from the method name and its already-validated params. `initialize`,
/// `ping`, `roots/list` and `logging/setLevel` never reach a real adapter:
/// the capability surface (gateway-adapter::capability) has no handshake or
/// log-level primitive, so the router answers those directly (see
/// DESIGN.md). Everything that isn't list/read/call funnels through
/// `execute_tool` with the method name standing in for the tool name, since
/// `execute_tool` is the only generic invocation primitive the capability
/// surface exposes.
#[derive(Debug, Clone)]
pub enum RouteKind {
    Protocol,
    ListTools,
    ListResources,
    ListPrompts,
    GetPrompt { name: String, arguments: HashMap<String, String> },
    ExecuteTool { name: String, arguments: Value },
    ReadResource { uri: String },
    Generic { operation: String, arguments: Value },
}

pub fn classify(method: &str, params: Option<&RequestParams>) -> RouteKind {
    match method {
        "initialize" | "ping" | "roots/list" | "logging/setLevel" => RouteKind::Protocol,
        "tools/list" => RouteKind::ListTools,
        "resources/list" => RouteKind::ListResources,
        "prompts/list" => RouteKind::ListPrompts,
        "prompts/get" => RouteKind::GetPrompt {
            name: params.and_then(|p| p.get("name")).and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            arguments: string_arguments(params),
        },
        "tools/call" => RouteKind::ExecuteTool {
            name: params.and_then(|p| p.get("name")).and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            arguments: params.and_then(|p| p.get("arguments")).cloned().unwrap_or(Value::Null),
        },
        "resources/read" => RouteKind::ReadResource {
            uri: params.and_then(|p| p.get("uri")).and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        },
        other => RouteKind::Generic {
            operation: other.to_string(),
            arguments: params.map(|p| p.to_value()).unwrap_or(Value::Null),
        },
    }
}

/// Best-effort string-keyed, string-valued view of `params.arguments`, used
/// to feed the closed-grammar prompt template renderer.
fn string_arguments(params: Option<&RequestParams>) -> HashMap<String, String> {
    let Some(Value::Object(map)) = params.and_then(|p| p.get("arguments")) else {
        return HashMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tools_call_extracts_name_and_arguments() {
        let params = RequestParams::Object(HashMap::from([
            ("name".to_string(), json!("get_weather")),
            ("arguments".to_string(), json!({"city": "nyc"})),
        ]));
        match classify("tools/call", Some(&params)) {
            RouteKind::ExecuteTool { name, arguments } => {
                assert_eq!(name, "get_weather");
                assert_eq!(arguments, json!({"city": "nyc"}));
            }
            _ => panic!("expected ExecuteTool"),
        }
    }

    #[test]
    fn protocol_methods_never_reach_an_adapter() {
        assert!(matches!(classify("initialize", None), RouteKind::Protocol));
        assert!(matches!(classify("ping", None), RouteKind::Protocol));
    }

    #[test]
    fn unrecognized_method_falls_back_to_generic() {
        match classify("completion/complete", None) {
            RouteKind::Generic { operation, .. } => assert_eq!(operation, "completion/complete"),
            _ => panic!("expected Generic"),
        }
    }

    #[test]
    fn prompts_get_collects_string_arguments_for_template_rendering() {
        let params = RequestParams::Object(HashMap::from([
            ("name".to_string(), json!("greeting")),
            ("arguments".to_string(), json!({"city": "nyc", "count": 3})),
        ]));
        match classify("prompts/get", Some(&params)) {
            RouteKind::GetPrompt { name, arguments } => {
                assert_eq!(name, "greeting");
                assert_eq!(arguments.get("city").map(String::as_str), Some("nyc"));
                assert!(!arguments.contains_key("count"));
            }
            _ => panic!("expected GetPrompt"),
        }
    }
}
