use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "mcp-gateway", about = "MCP enablement gateway: JSON-RPC front edge over registered service adapters")]
pub struct Cli {
    /// Path to the gateway's YAML configuration file.
    #[arg(long, default_value = "gateway.yaml")]
    pub config: PathBuf,

    /// Overrides `bind_address` from the config file.
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Overrides `log_level` from the config file.
    #[arg(long)]
    pub log_level: Option<String>,
}
