//! Library half of the gateway binary: CLI parsing, YAML configuration,
//! process wiring, and signal handling. Kept separate from `main.rs` so the
//! workspace's cross-crate integration tests (`tests/end_to_end.rs`) can
//! build a full `Gateway` in-process without spawning the binary.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod signals;

pub mod prelude {
    pub use crate::bootstrap::Gateway;
    pub use crate::cli::Cli;
    pub use crate::config::{load as load_config, GatewayConfig};
}
