//! Request router & dispatcher: the seven-step pipeline (admission, parse &
//! validate, route, select, dispatch, retry, respond) that sits between the
//! HTTP front edge and the registered adapters.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod router;

pub mod prelude {
    pub use crate::config::RouterConfig;
    pub use crate::dispatch::{classify, RouteKind};
    pub use crate::error::{categorize_adapter_error, wrap_adapter_error};
    pub use crate::metrics::{RouterMetrics, RouterMetricsSnapshot};
    pub use crate::router::{RequestHeaders, Router};
}
