//! Request identity, cancellation, and the breadcrumb trail
//! `RequestContext` is the only legal carrier of trace/span ids across the
//! gateway's component boundaries.

pub mod breadcrumb;
pub mod context;

pub mod prelude {
    pub use crate::breadcrumb::{Breadcrumb, BreadcrumbTrail};
    pub use crate::context::{CompletionSummary, RequestContext, RequestIdentity, ResourceSnapshot};
}
