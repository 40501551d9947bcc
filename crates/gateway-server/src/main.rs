//! Process entrypoint: CLI parsing, config loading, tracing init, dependency
//! wiring, and the run-until-shutdown lifecycle (spec.md §6).

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use gateway_http::server::{GatewayHttpServer, HttpConfig};
use gateway_server::{bootstrap::Gateway, cli::Cli, config};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut gateway_config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(bind_address) = &cli.bind_address {
        match bind_address.parse() {
            Ok(addr) => gateway_config.bind_address = addr,
            Err(_) => {
                eprintln!("invalid --bind-address: {bind_address}");
                return ExitCode::from(2);
            }
        }
    }
    if let Some(log_level) = &cli.log_level {
        gateway_config.log_level = log_level.clone();
    }

    init_tracing(&gateway_config.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(gateway_config, cli.config))
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(gateway_config: config::GatewayConfig, config_path: std::path::PathBuf) -> ExitCode {
    let gateway = Gateway::build(&gateway_config);
    gateway.register_configured_adapters(&gateway_config).await;
    gateway.spawn_background_tasks(Duration::from_secs(gateway_config.health_check_interval_secs));

    let reload_shutdown = gateway.shutdown.clone();
    let reload_controller = std::sync::Arc::clone(&gateway.state.reload_controller);
    let reload_task = tokio::spawn(gateway_server::signals::run_signal_driven_reload(config_path, reload_controller, reload_shutdown));

    let http_config = HttpConfig {
        bind_address: gateway_config.bind_address,
        mcp_path: gateway_config.mcp_path.clone(),
    };
    let server = GatewayHttpServer::new(http_config, gateway.state.clone());
    let server_shutdown = gateway.shutdown.clone();
    let server_task = tokio::spawn(async move { server.run(server_shutdown).await });

    gateway_server::signals::wait_for_shutdown().await;
    tracing::info!("shutting down");
    gateway.shutdown.cancel();

    let shutdown_deadline = Duration::from_secs(gateway_config.shutdown_deadline_secs);
    if !gateway.state.pool.close(shutdown_deadline).await {
        tracing::warn!("worker pool did not drain within the shutdown deadline");
    }

    let _ = reload_task.await;
    match server_task.await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            tracing::error!(error = %err, "HTTP server exited with an error");
            ExitCode::from(1)
        }
        Err(err) => {
            tracing::error!(error = %err, "HTTP server task panicked");
            ExitCode::from(1)
        }
    }
}
