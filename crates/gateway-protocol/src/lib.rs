//! MCP-specific protocol concerns layered over the transport-agnostic
//! JSON-RPC types in `gateway-jsonrpc`: the method whitelist and params
//! validation table, capability manifest types, content-block shapes, the
//! prompt template grammar, and the error taxonomy.

pub mod content;
pub mod definitions;
pub mod error;
pub mod method;
pub mod schema;
pub mod template;

pub mod prelude {
    pub use crate::content::{AdapterContent, ContentBlock};
    pub use crate::definitions::{CapabilityManifest, ManifestError, PromptArgument, PromptDefinition, ResourceDefinition, ToolDefinition};
    pub use crate::error::{ErrorCategory, ErrorSeverity, GatewayError};
    pub use crate::method::{is_known_method, is_notification_method, missing_required_field, params_shape_for, service_type_for, ParamsShape, KNOWN_METHODS};
    pub use crate::schema::{validate as validate_schema, SchemaError};
    pub use crate::template::{render as render_template, TemplateError};
}
