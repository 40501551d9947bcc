use gateway_adapter::error::AdapterError;
use gateway_protocol::error::{ErrorCategory, GatewayError};

/// Assigns a category to an adapter error from its `code` string when the
/// adapter didn't (and can't) give one directly — adapters only speak
/// `{code, message, details, suggestions, retryable}`, not the gateway's own
/// category enum.
pub fn categorize_adapter_error(err: &AdapterError) -> ErrorCategory {
    let code = err.code.as_str();
    if code.contains("timeout") {
        ErrorCategory::Timeout
    } else if code.contains("network") {
        ErrorCategory::Network
    } else if code.contains("unavailable") || code.contains("backend_error") || code.contains("pool_full") || code.contains("pool_closed") {
        ErrorCategory::Unavailable
    } else if code.contains("invalid_manifest") || code.contains("manifest_invalid") || code.contains("invalid_response") || code.contains("invalid_state_transition") {
        ErrorCategory::Validation
    } else if code.contains("config") {
        ErrorCategory::Configuration
    } else {
        ErrorCategory::Internal
    }
}

/// Wraps an adapter's error at the dispatch boundary: preserves the raw
/// cause, assigns a category, and carries the adapter's own `retryable`
/// flag through rather than the category's default.
pub fn wrap_adapter_error(err: AdapterError, service: &str, operation: &str) -> GatewayError {
    let category = categorize_adapter_error(&err);
    let mut wrapped = GatewayError::new(category, service, operation, err.message.clone()).with_cause(err.code.clone());
    wrapped.retryable = err.retryable;
    wrapped.temporary = err.retryable;
    for suggestion in err.suggestions {
        wrapped.suggestions.push(suggestion);
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_code_maps_to_network_category() {
        let err = AdapterError::new("network_error", "connection refused", true);
        assert_eq!(categorize_adapter_error(&err), ErrorCategory::Network);
    }

    #[test]
    fn unrecognized_code_falls_back_to_internal() {
        let err = AdapterError::new("mystery", "oops", false);
        assert_eq!(categorize_adapter_error(&err), ErrorCategory::Internal);
    }

    #[test]
    fn wrap_preserves_adapters_own_retryable_flag_over_category_default() {
        // internal defaults to non-retryable, but the adapter says otherwise.
        let err = AdapterError::new("mystery", "oops", true);
        let wrapped = wrap_adapter_error(err, "svc", "op");
        assert!(wrapped.retryable);
    }
}
