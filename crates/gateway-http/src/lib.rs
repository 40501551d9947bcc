//! HTTP front edge (spec.md §6): `/mcp`, `/mcp/<method>`, and the
//! `/v1/admin/*` surface, built on raw hyper the way the teacher framework's
//! `turul-http-mcp-server` is.

pub mod admin;
pub mod app;
pub mod headers;
pub mod server;

pub mod prelude {
    pub use crate::admin::ReloadRequest;
    pub use crate::app::GatewayState;
    pub use crate::server::{GatewayHttpServer, HttpConfig};
}
