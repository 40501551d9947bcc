//! Transport-agnostic JSON-RPC 2.0 envelope types and dispatch.
//!
//! This crate knows nothing about MCP, HTTP, or the gateway's adapters; it
//! only speaks JSON-RPC 2.0 (request/notification/response/error framing and
//! the standard error code table). Everything MCP-specific lives in
//! `gateway-protocol`.

pub mod dispatch;
pub mod error;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub mod prelude {
    pub use crate::dispatch::{FunctionHandler, JsonRpcDispatcher, JsonRpcHandler};
    pub use crate::error::{
        JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcTransportError,
    };
    pub use crate::notification::JsonRpcNotification;
    pub use crate::request::{JsonRpcEnvelope, JsonRpcRequest, RequestParams};
    pub use crate::response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
    pub use crate::types::{JsonRpcVersion, RequestId};
}

pub const JSONRPC_VERSION: &str = "2.0";
