//! Typed process configuration, loaded from YAML with environment-variable
//! overrides applied post-parse. Config loading itself is an external
//! collaborator (spec.md §1); only the resulting typed struct and its
//! defaults belong to the core (SPEC_FULL.md §2).

use std::net::SocketAddr;
use std::time::Duration;

use gateway_registry::strategy::LbStrategy;
use gateway_reload::controller::ReloadConfig;
use gateway_resilience::circuit_breaker::CircuitBreakerConfig;
use gateway_resilience::memory_monitor::MemoryMonitorConfig;
use gateway_resilience::worker_pool::WorkerPoolConfig;
use gateway_router::config::RouterConfig;
use serde::{Deserialize, Serialize};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn millis(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    #[serde(default = "defaults::max_request_size")]
    pub max_request_size: usize,
    #[serde(default = "defaults::retry_enabled")]
    pub retry_enabled: bool,
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "defaults::retry_backoff_millis")]
    pub retry_backoff_millis: u64,
    #[serde(default)]
    pub lb_strategy: LbStrategy,
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "defaults::validate_responses")]
    pub validate_responses: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_request_size: defaults::max_request_size(),
            retry_enabled: defaults::retry_enabled(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_millis: defaults::retry_backoff_millis(),
            lb_strategy: LbStrategy::default(),
            request_timeout_secs: defaults::request_timeout_secs(),
            validate_responses: defaults::validate_responses(),
        }
    }
}

impl From<&RouterSettings> for RouterConfig {
    fn from(s: &RouterSettings) -> Self {
        RouterConfig {
            max_request_size: s.max_request_size,
            retry_enabled: s.retry_enabled,
            retry_attempts: s.retry_attempts,
            retry_backoff: millis(s.retry_backoff_millis),
            lb_strategy: s.lb_strategy,
            request_timeout: secs(s.request_timeout_secs),
            validate_responses: s.validate_responses,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,
    #[serde(default = "defaults::queue_size")]
    pub queue_size: usize,
    #[serde(default = "defaults::task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_workers: defaults::max_workers(),
            queue_size: defaults::queue_size(),
            task_timeout_secs: defaults::task_timeout_secs(),
        }
    }
}

impl From<&PoolSettings> for WorkerPoolConfig {
    fn from(s: &PoolSettings) -> Self {
        WorkerPoolConfig {
            max_workers: s.max_workers,
            queue_size: s.queue_size,
            task_timeout: secs(s.task_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "defaults::check_period_secs")]
    pub check_period_secs: u64,
    #[serde(default = "defaults::threshold_bytes")]
    pub threshold_bytes: u64,
    #[serde(default = "defaults::gc_trigger_bytes")]
    pub gc_trigger_bytes: u64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            check_period_secs: defaults::check_period_secs(),
            threshold_bytes: defaults::threshold_bytes(),
            gc_trigger_bytes: defaults::gc_trigger_bytes(),
        }
    }
}

impl From<&MemorySettings> for MemoryMonitorConfig {
    fn from(s: &MemorySettings) -> Self {
        MemoryMonitorConfig {
            check_period: secs(s.check_period_secs),
            threshold_bytes: s.threshold_bytes,
            gc_trigger_bytes: s.gc_trigger_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "defaults::max_failures")]
    pub max_failures: usize,
    #[serde(default = "defaults::reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    #[serde(default = "defaults::success_threshold")]
    pub success_threshold: usize,
    #[serde(default = "defaults::half_open_max")]
    pub half_open_max: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: defaults::max_failures(),
            reset_timeout_secs: defaults::reset_timeout_secs(),
            success_threshold: defaults::success_threshold(),
            half_open_max: defaults::half_open_max(),
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(s: &BreakerSettings) -> Self {
        CircuitBreakerConfig {
            max_failures: s.max_failures,
            reset_timeout: secs(s.reset_timeout_secs),
            success_threshold: s.success_threshold,
            half_open_max: s.half_open_max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadSettings {
    #[serde(default = "defaults::max_concurrent_reloads")]
    pub max_concurrent_reloads: usize,
    #[serde(default = "defaults::require_version_upgrade")]
    pub require_version_upgrade: bool,
    #[serde(default = "defaults::backup_retention_secs")]
    pub backup_retention_secs: u64,
    #[serde(default = "defaults::reload_timeout_secs")]
    pub reload_timeout_secs: u64,
    #[serde(default = "defaults::auto_rollback_on_failure")]
    pub auto_rollback_on_failure: bool,
    #[serde(default = "defaults::history_limit")]
    pub history_limit: usize,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_reloads: defaults::max_concurrent_reloads(),
            require_version_upgrade: defaults::require_version_upgrade(),
            backup_retention_secs: defaults::backup_retention_secs(),
            reload_timeout_secs: defaults::reload_timeout_secs(),
            auto_rollback_on_failure: defaults::auto_rollback_on_failure(),
            history_limit: defaults::history_limit(),
        }
    }
}

impl From<&ReloadSettings> for ReloadConfig {
    fn from(s: &ReloadSettings) -> Self {
        ReloadConfig {
            max_concurrent_reloads: s.max_concurrent_reloads,
            require_version_upgrade: s.require_version_upgrade,
            backup_retention_period: secs(s.backup_retention_secs),
            reload_timeout: secs(s.reload_timeout_secs),
            auto_rollback_on_failure: s.auto_rollback_on_failure,
            history_limit: s.history_limit,
        }
    }
}

/// One adapter the gateway registers at startup. Adapter *implementations*
/// are an external collaborator (spec.md §1); the only variant the core can
/// construct from declarative config is the HTTP-remote proxy
/// (`gateway_adapter::http::HttpAdapter`) — in-process adapters are wired in
/// Rust by whoever embeds this crate, not described in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub service_type: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    #[serde(default = "defaults::weight")]
    pub weight: f64,
    #[serde(default)]
    pub config: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "defaults::bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "defaults::mcp_path")]
    pub mcp_path: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default = "defaults::health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default = "defaults::shutdown_deadline_secs")]
    pub shutdown_deadline_secs: u64,
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub reload: ReloadSettings,
    #[serde(default)]
    pub adapters: Vec<AdapterEntry>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::bind_address(),
            mcp_path: defaults::mcp_path(),
            log_level: defaults::log_level(),
            health_check_interval_secs: defaults::health_check_interval_secs(),
            shutdown_deadline_secs: defaults::shutdown_deadline_secs(),
            router: RouterSettings::default(),
            pool: PoolSettings::default(),
            memory: MemorySettings::default(),
            breaker: BreakerSettings::default(),
            reload: ReloadSettings::default(),
            adapters: Vec::new(),
        }
    }
}

mod defaults {
    use std::net::SocketAddr;

    pub fn bind_address() -> SocketAddr {
        "0.0.0.0:8080".parse().unwrap()
    }
    pub fn mcp_path() -> String {
        "/mcp".to_string()
    }
    pub fn log_level() -> String {
        "info".to_string()
    }
    pub fn health_check_interval_secs() -> u64 {
        15
    }
    pub fn shutdown_deadline_secs() -> u64 {
        30
    }
    pub fn max_request_size() -> usize {
        1 << 20
    }
    pub fn retry_enabled() -> bool {
        true
    }
    pub fn retry_attempts() -> u32 {
        2
    }
    pub fn retry_backoff_millis() -> u64 {
        100
    }
    pub fn request_timeout_secs() -> u64 {
        30
    }
    pub fn validate_responses() -> bool {
        cfg!(debug_assertions)
    }
    pub fn max_workers() -> usize {
        32
    }
    pub fn queue_size() -> usize {
        256
    }
    pub fn task_timeout_secs() -> u64 {
        30
    }
    pub fn check_period_secs() -> u64 {
        10
    }
    pub fn threshold_bytes() -> u64 {
        1 << 30
    }
    pub fn gc_trigger_bytes() -> u64 {
        (1 << 30) + (256 << 20)
    }
    pub fn max_failures() -> usize {
        5
    }
    pub fn reset_timeout_secs() -> u64 {
        30
    }
    pub fn success_threshold() -> usize {
        2
    }
    pub fn half_open_max() -> usize {
        1
    }
    pub fn max_concurrent_reloads() -> usize {
        2
    }
    pub fn require_version_upgrade() -> bool {
        true
    }
    pub fn backup_retention_secs() -> u64 {
        24 * 3600
    }
    pub fn reload_timeout_secs() -> u64 {
        30
    }
    pub fn auto_rollback_on_failure() -> bool {
        true
    }
    pub fn history_limit() -> usize {
        200
    }
    pub fn weight() -> f64 {
        1.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: serde_yaml::Error },
    #[error("invalid environment override for {var}: {value}")]
    InvalidOverride { var: &'static str, value: String },
}

/// Loads `GatewayConfig` from a YAML file, then applies environment
/// variable overrides (`GATEWAY_BIND_ADDR`, `GATEWAY_LOG_LEVEL`,
/// `GATEWAY_MAX_WORKERS`).
pub fn load(path: &std::path::Path) -> Result<GatewayConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    let mut config: GatewayConfig =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

pub fn apply_env_overrides(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var("GATEWAY_BIND_ADDR") {
        config.bind_address = value.parse().map_err(|_| ConfigError::InvalidOverride { var: "GATEWAY_BIND_ADDR", value: value.clone() })?;
    }
    if let Ok(value) = std::env::var("GATEWAY_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = std::env::var("GATEWAY_MAX_WORKERS") {
        config.pool.max_workers = value.parse().map_err(|_| ConfigError::InvalidOverride { var: "GATEWAY_MAX_WORKERS", value: value.clone() })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_yaml_document() {
        let config: GatewayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.bind_address, defaults::bind_address());
        assert_eq!(config.pool.max_workers, 32);
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let config: GatewayConfig = serde_yaml::from_str("log_level: debug\npool:\n  max_workers: 4\n").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.pool.max_workers, 4);
        assert_eq!(config.pool.queue_size, defaults::queue_size());
    }

    #[test]
    fn bind_addr_env_override_wins_over_file() {
        let mut config = GatewayConfig::default();
        unsafe {
            std::env::set_var("GATEWAY_BIND_ADDR", "127.0.0.1:9999");
        }
        apply_env_overrides(&mut config).unwrap();
        unsafe {
            std::env::remove_var("GATEWAY_BIND_ADDR");
        }
        assert_eq!(config.bind_address, "127.0.0.1:9999".parse().unwrap());
    }

    #[test]
    fn invalid_bind_addr_override_is_rejected() {
        let mut config = GatewayConfig::default();
        unsafe {
            std::env::set_var("GATEWAY_BIND_ADDR", "not-an-address");
        }
        let result = apply_env_overrides(&mut config);
        unsafe {
            std::env::remove_var("GATEWAY_BIND_ADDR");
        }
        assert!(result.is_err());
    }
}
