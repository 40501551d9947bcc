//! Staged hot-reload controller: validate, backup, quiesce, shutdown,
//! register, initialize, update-dependencies, with rollback on failure.

pub mod controller;
pub mod error;
pub mod operation;

pub mod prelude {
    pub use crate::controller::{HotReloadController, ReloadConfig};
    pub use crate::error::ReloadError;
    pub use crate::operation::{ReloadOperation, ReloadStatus, ReloadStep, StepRecord, StepStatus};
}
