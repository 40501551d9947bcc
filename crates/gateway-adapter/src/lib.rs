//! Adapter capability surface and its two concrete variants: in-process
//! (local function calls) and HTTP-remote (proxied over `reqwest`).

pub mod capability;
pub mod dependency_graph;
pub mod error;
pub mod http;
pub mod in_process;
pub mod metadata;
pub mod state;

pub mod prelude {
    pub use crate::capability::AdapterCapability;
    pub use crate::dependency_graph::{CycleError, DependencyGraph};
    pub use crate::error::AdapterError;
    pub use crate::http::HttpAdapter;
    pub use crate::in_process::{InProcessAdapter, LocalToolHandler};
    pub use crate::metadata::{AdapterMetadata, AdapterMetricsSnapshot};
    pub use crate::state::{AdapterState, AdapterStateCell};
}
