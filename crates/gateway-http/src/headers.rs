//! Maps the honored request headers (`X-Trace-ID`, `X-Span-ID`, `X-Client-ID`,
//! `X-User-ID`, `X-Session-ID`) onto the router's `RequestHeaders`.

use gateway_router::router::RequestHeaders;
use hyper::HeaderMap;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}

/// Client identity from `X-Client-ID`. Not part of `RequestIdentity` (the
/// core tracks principal/session, not client), but worth a log field at the
/// edge where the header actually arrives.
pub fn client_id(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "X-Client-ID")
}

pub fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    RequestHeaders {
        trace_id: header_str(headers, "X-Trace-ID"),
        span_id: header_str(headers, "X-Span-ID"),
        user_id: header_str(headers, "X-User-ID"),
        session_id: header_str(headers, "X-Session-ID"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_headers_yield_none_fields() {
        let headers = HeaderMap::new();
        let parsed = request_headers(&headers);
        assert!(parsed.trace_id.is_none());
        assert!(parsed.user_id.is_none());
    }

    #[test]
    fn present_headers_are_read_back() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Trace-ID", "trace-1".parse().unwrap());
        headers.insert("X-User-ID", "user-1".parse().unwrap());
        let parsed = request_headers(&headers);
        assert_eq!(parsed.trace_id.as_deref(), Some("trace-1"));
        assert_eq!(parsed.user_id.as_deref(), Some("user-1"));
    }
}
