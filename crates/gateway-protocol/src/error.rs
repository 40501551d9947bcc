use gateway_jsonrpc::error::{JsonRpcErrorCode, JsonRpcErrorObject};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};

/// The eleven error kinds a gateway error can carry. These are *kinds*, not
/// Rust types: every `GatewayError` carries exactly one, plus severity and
/// the retryable/user_error/temporary flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    RateLimit,
    Timeout,
    Unavailable,
    Internal,
    Network,
    Configuration,
    Resource,
    Business,
}

impl ErrorCategory {
    /// Breaker-recording rule: these categories count as a
    /// breaker failure; everything else (validation, policy rejections,
    /// cancellation) does not.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::Network | ErrorCategory::Unavailable | ErrorCategory::Internal
        )
    }

    fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::Unavailable | ErrorCategory::Network | ErrorCategory::RateLimit
        )
    }

    fn jsonrpc_code(&self) -> JsonRpcErrorCode {
        match self {
            ErrorCategory::Validation => JsonRpcErrorCode::InvalidParams,
            ErrorCategory::Internal => JsonRpcErrorCode::InternalError,
            ErrorCategory::Timeout => JsonRpcErrorCode::ServerError(-32001),
            // Unavailable and Resource (backpressure) share the
            // breaker-open/backpressure bucket; Network gets its own code.
            ErrorCategory::Unavailable => JsonRpcErrorCode::ServerError(-32004),
            ErrorCategory::Resource => JsonRpcErrorCode::ServerError(-32004),
            ErrorCategory::Network => JsonRpcErrorCode::ServerError(-32005),
            ErrorCategory::Authentication => JsonRpcErrorCode::ServerError(-32010),
            ErrorCategory::Authorization => JsonRpcErrorCode::ServerError(-32011),
            ErrorCategory::RateLimit => JsonRpcErrorCode::ServerError(-32012),
            ErrorCategory::Business => JsonRpcErrorCode::ServerError(-32020),
            ErrorCategory::Configuration => JsonRpcErrorCode::ServerError(-32030),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A fully-formed gateway error: the common envelope every adapter error and
/// internal failure is normalized into before it reaches the router.
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub service: String,
    pub operation: String,
    pub cause: Option<String>,
    pub suggestions: Vec<String>,
    pub retryable: bool,
    pub user_error: bool,
    pub temporary: bool,
    pub retry_after: Option<u64>,
    /// Overrides the JSON-RPC code the category would otherwise pick. The
    /// 11-kind taxonomy doesn't carve out a category per wire code (e.g.
    /// `method_not_found` is a flavor of `validation`, not its own kind), so
    /// this lets a specific site pin the exact code spec.md's error-mapping
    /// table assigns without inventing a twelfth category.
    pub code_override: Option<i64>,
}

impl GatewayError {
    pub fn new(category: ErrorCategory, service: impl Into<String>, operation: impl Into<String>, message: impl Into<String>) -> Self {
        let retryable = category.default_retryable();
        Self {
            category,
            severity: ErrorSeverity::Medium,
            message: message.into(),
            service: service.into(),
            operation: operation.into(),
            cause: None,
            suggestions: default_suggestions(category),
            retryable,
            user_error: matches!(category, ErrorCategory::Validation | ErrorCategory::Authentication | ErrorCategory::Authorization),
            temporary: retryable,
            retry_after: None,
            code_override: None,
        }
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn with_code_override(mut self, code: i64) -> Self {
        self.code_override = Some(code);
        self
    }

    /// Deterministic fingerprint for deduplication: `sha1(service:category:
    /// operation:message_shape)`. `message_shape` normalizes out digits and
    /// quoted literals so that e.g. two timeouts differing only in a
    /// duration collapse to one fingerprint.
    pub fn fingerprint(&self) -> String {
        let shape = message_shape(&self.message);
        let input = format!("{}:{:?}:{}:{}", self.service, self.category, self.operation, shape);
        let mut hasher = Sha1::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Converts to the JSON-RPC error object the router writes to the wire,
    /// attaching the `data` envelope (category/severity/trace_id/retryable/
    /// suggestions).
    pub fn to_error_object(&self, trace_id: &str) -> JsonRpcErrorObject {
        let code = self.code_override.unwrap_or_else(|| self.category.jsonrpc_code().code());
        let mut data = json!({
            "category": self.category,
            "severity": self.severity,
            "trace_id": trace_id,
            "retryable": self.retryable,
            "suggestions": self.suggestions,
        });
        if let Some(cause) = &self.cause {
            data["cause"] = Value::String(cause.clone());
        }
        if let Some(retry_after) = self.retry_after {
            data["retry_after"] = json!(retry_after);
        }
        JsonRpcErrorObject { code, message: self.message.clone(), data: Some(data) }
    }
}

fn default_suggestions(category: ErrorCategory) -> Vec<String> {
    match category {
        ErrorCategory::Timeout => vec!["retry with backoff, check backend health".to_string()],
        ErrorCategory::Unavailable => vec!["retry after the suggested interval".to_string()],
        ErrorCategory::Network => vec!["check backend connectivity".to_string()],
        ErrorCategory::RateLimit => vec!["reduce request rate, retry after the interval".to_string()],
        ErrorCategory::Resource => vec!["retry after the suggested interval; reduce concurrent load".to_string()],
        ErrorCategory::Validation => vec!["check request parameters against the declared schema".to_string()],
        ErrorCategory::Authentication => vec!["verify credentials".to_string()],
        ErrorCategory::Authorization => vec!["request the required role/permission".to_string()],
        ErrorCategory::Configuration => vec!["check adapter configuration".to_string()],
        ErrorCategory::Business => vec!["see message for the violated rule".to_string()],
        ErrorCategory::Internal => vec!["contact the service operator if this persists".to_string()],
    }
}

/// Replaces digit runs and quoted substrings with placeholders so messages
/// that differ only in their concrete values fingerprint identically.
fn message_shape(message: &str) -> String {
    let mut shape = String::with_capacity(message.len());
    let mut chars = message.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            shape.push('#');
            while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
                chars.next();
            }
        } else if c == '"' {
            shape.push_str("\"*\"");
            for next in chars.by_ref() {
                if next == '"' {
                    break;
                }
            }
        } else {
            shape.push(c);
        }
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_reserved_server_error_code() {
        let err = GatewayError::new(ErrorCategory::Timeout, "mysql-prod-001", "resources/read", "call timed out");
        let obj = err.to_error_object("trace-1");
        assert_eq!(obj.code, -32001);
        assert_eq!(obj.data.as_ref().unwrap()["retryable"], true);
    }

    #[test]
    fn validation_errors_are_not_retryable_by_default() {
        let err = GatewayError::new(ErrorCategory::Validation, "mysql", "tools/call", "bad input");
        assert!(!err.retryable);
        assert!(err.user_error);
    }

    #[test]
    fn breaker_recording_rule_matches_spec_categories() {
        assert!(ErrorCategory::Timeout.counts_toward_breaker());
        assert!(ErrorCategory::Network.counts_toward_breaker());
        assert!(ErrorCategory::Unavailable.counts_toward_breaker());
        assert!(ErrorCategory::Internal.counts_toward_breaker());
        assert!(!ErrorCategory::Validation.counts_toward_breaker());
        assert!(!ErrorCategory::Business.counts_toward_breaker());
    }

    #[test]
    fn fingerprint_collapses_differing_numeric_values() {
        let a = GatewayError::new(ErrorCategory::Timeout, "svc", "op", "timed out after 100ms");
        let b = GatewayError::new(ErrorCategory::Timeout, "svc", "op", "timed out after 5000ms");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_across_categories() {
        let a = GatewayError::new(ErrorCategory::Timeout, "svc", "op", "failed");
        let b = GatewayError::new(ErrorCategory::Network, "svc", "op", "failed");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn resource_category_used_for_backpressure_maps_to_breaker_open_bucket() {
        let err = GatewayError::new(ErrorCategory::Resource, "gateway", "initialize", "memory over threshold")
            .with_retry_after(2);
        let obj = err.to_error_object("trace-2");
        assert_eq!(obj.code, -32004);
        assert_eq!(obj.data.as_ref().unwrap()["retry_after"], 2);
    }
}
