use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plugin_bridge_core::config::{resolve_base_dir, Config, LOG_ENV};
use plugin_bridge_core::{ClaudeCli, CliRunner, PluginOps, PluginRegistry};
use plugin_bridge_mcp::PluginBridgeServer;

#[derive(Parser)]
#[command(name = "plugin-bridge-mcp")]
#[command(about = "MCP server for verified Claude Code plugin management")]
#[command(version)]
struct Args {
    /// Base directory (default: ~/.plugin-bridge)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Debug logging for the bridge crates (stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr
    let filter = if args.verbose {
        EnvFilter::new("warn,plugin_bridge_core=debug,plugin_bridge_mcp=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let base_dir = resolve_base_dir(args.base_dir);
    let config = Config::load(&base_dir)
        .with_context(|| format!("loading config from {}", base_dir.display()))?;

    let registry = PluginRegistry::new(config.layout()?);
    let runner: Box<dyn CliRunner> = Box::new(ClaudeCli::new(
        &config.cli.binary,
        config.cli.probe_timeout(),
    ));
    info!(
        plugins_dir = %registry.plugins_dir().display(),
        binary = %runner.binary(),
        "starting plugin-bridge MCP server"
    );

    let ops = PluginOps::new(registry, runner, config.cli.timeout());
    let server = PluginBridgeServer::new(ops);

    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
