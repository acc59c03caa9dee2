//! pg-mcp-gateway - a stateful Postgres MCP gateway with deterministic
//! conversation compaction.
//!
//! This is the main entry point for the gateway binary.

use clap::{Parser, Subcommand};
use pgmcp_core::Config;
use pgmcp_server::GatewayState;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pgmcp")]
#[command(author, version, about = "Postgres MCP gateway", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway, speaking MCP over stdio or HTTP
    Serve {
        /// Transport to serve on
        #[arg(long, value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,

        /// Address to bind when using the HTTP transport
        #[arg(long, default_value = "127.0.0.1:8765")]
        address: SocketAddr,

        /// Path to a JSONC configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file and print the resolved settings
    CheckConfig {
        /// Path to a JSONC configuration file
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pgmcp_util::log::init(cli.verbose);

    match cli.command {
        Commands::Serve {
            transport,
            address,
            config,
        } => run_serve(transport, address, config).await,
        Commands::CheckConfig { config } => run_check_config(config).await,
    }
}

async fn run_serve(transport: Transport, address: SocketAddr, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, sources) = Config::load(config_path.as_deref()).await?;
    info!(sources = ?sources, databases = config.databases.len(), "loaded gateway configuration");

    let state = GatewayState::new("pg-mcp-gateway", env!("CARGO_PKG_VERSION"), config);

    match transport {
        Transport::Stdio => pgmcp_server::serve_stdio(state).await.map_err(Into::into),
        Transport::Http => {
            let router = pgmcp_server::create_router(state);
            let listener = tokio::net::TcpListener::bind(address).await?;
            info!(%address, "gateway listening on HTTP");
            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}

async fn run_check_config(config_path: PathBuf) -> anyhow::Result<()> {
    let (config, sources) = Config::load(Some(&config_path)).await?;
    println!("Loaded from: {sources:?}");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
