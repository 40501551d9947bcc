use gateway_jsonrpc::request::RequestParams;

/// The method whitelist enforced at parse & validate.
/// Methods not on this list are *warned about but still routed* — the
/// whitelist is advisory for telemetry, not a hard gate, per the pipeline's
/// "unknown methods warn but route" rule.
pub const KNOWN_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
    "resources/subscribe",
    "resources/unsubscribe",
    "prompts/list",
    "prompts/get",
    "logging/setLevel",
    "completion/complete",
    "sampling/createMessage",
    "roots/list",
];

pub fn is_known_method(method: &str) -> bool {
    KNOWN_METHODS.contains(&method) || method.starts_with("notifications/")
}

pub fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// What a method's `params` must contain, checked before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsShape {
    /// No constraints beyond being present-or-absent.
    Unconstrained,
    /// Named fields that must be present (others are ignored); fields not in
    /// this list but suffixed `?` in the table are optional and unchecked.
    RequiredFields(&'static [&'static str]),
}

/// The params-shape constraint table `*/list` methods accept an optional `cursor` and are
/// otherwise unconstrained.
pub fn params_shape_for(method: &str) -> ParamsShape {
    match method {
        "initialize" => ParamsShape::RequiredFields(&["protocolVersion", "clientInfo", "capabilities"]),
        "tools/call" => ParamsShape::RequiredFields(&["name"]),
        "resources/read" => ParamsShape::RequiredFields(&["uri"]),
        "prompts/get" => ParamsShape::RequiredFields(&["name"]),
        m if m.ends_with("/list") => ParamsShape::Unconstrained,
        _ => ParamsShape::Unconstrained,
    }
}

/// Checks `params` against the method's required-fields table. Returns the
/// name of the first missing field, if any.
pub fn missing_required_field(method: &str, params: Option<&RequestParams>) -> Option<&'static str> {
    let ParamsShape::RequiredFields(fields) = params_shape_for(method) else {
        return None;
    };
    for field in fields {
        let present = params.and_then(|p| p.get(field)).is_some();
        if !present {
            return Some(field);
        }
    }
    None
}

/// Maps a method to a coarse service type for registry routing: exact
/// lookup table first, then `<prefix>_provider` derivation, then a final
/// fallback.
pub fn service_type_for(method: &str) -> String {
    let exact = match method {
        "tools/list" | "tools/call" => Some("tool_provider"),
        "resources/list" | "resources/read" | "resources/subscribe" | "resources/unsubscribe" => {
            Some("resource_provider")
        }
        "prompts/list" | "prompts/get" => Some("prompt_provider"),
        "initialize" | "ping" | "roots/list" => Some("generic_adapter"),
        _ => None,
    };
    if let Some(service_type) = exact {
        return service_type.to_string();
    }
    if let Some((prefix, _)) = method.split_once('/') {
        return format!("{prefix}_provider");
    }
    "generic_adapter".to_string()
}
