//! Process signal handling (spec.md §6): `SIGTERM`/`SIGINT` trigger graceful
//! shutdown, `SIGHUP` re-reads configuration and feeds changed adapters
//! through the hot-reload controller, `SIGUSR1` acknowledges a log-rotation
//! request (rotation itself is external collaborator plumbing).

use std::path::PathBuf;
use std::sync::Arc;

use gateway_adapter::http::HttpAdapter;
use gateway_adapter::metadata::AdapterMetadata;
use gateway_reload::controller::HotReloadController;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config;

#[cfg(unix)]
pub async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = term.recv() => info!("received SIGTERM"),
        _ = int.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

/// Runs until `shutdown` fires, re-reading `config_path` on every `SIGHUP`
/// and diffing declared adapters against the registry's current versions.
/// Any adapter whose declared config changed is fed through the hot-reload
/// controller; `SIGUSR1` only logs an acknowledgement since log rotation
/// itself is external collaborator plumbing (spec.md §1).
#[cfg(unix)]
pub async fn run_signal_driven_reload(config_path: PathBuf, reload_controller: Arc<HotReloadController>, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut usr1 = signal(SignalKind::user_defined1()).expect("failed to install SIGUSR1 handler");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = hup.recv() => {
                info!("received SIGHUP, reloading configuration");
                if let Err(err) = reload_from_disk(&config_path, &reload_controller).await {
                    error!(error = %err, "SIGHUP-triggered reload failed");
                }
            }
            _ = usr1.recv() => {
                info!("received SIGUSR1: log rotation acknowledged");
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn run_signal_driven_reload(_config_path: PathBuf, _reload_controller: Arc<HotReloadController>, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}

async fn reload_from_disk(config_path: &std::path::Path, reload_controller: &Arc<HotReloadController>) -> Result<(), config::ConfigError> {
    let new_config = config::load(config_path)?;
    for entry in &new_config.adapters {
        let metadata = AdapterMetadata {
            id: format!("{}-{}", entry.name, entry.version),
            name: entry.name.clone(),
            service_type: entry.service_type.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
            config: entry.config.clone(),
            dependencies: entry.dependencies.clone(),
        };
        let adapter = Arc::new(HttpAdapter::new(metadata, entry.base_url.clone(), reqwest::Client::new()));
        match reload_controller
            .reload(&entry.service_type, &entry.name, adapter, entry.weight, entry.config.clone())
            .await
        {
            Ok(op) => info!(plugin_name = %entry.name, status = ?op.status, "SIGHUP reload completed"),
            Err(err) => warn!(plugin_name = %entry.name, error = %err, "SIGHUP reload rejected"),
        }
    }
    Ok(())
}
