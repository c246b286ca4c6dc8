//! crosslink-devnode: in-memory node serving the `cross` namespace.
//!
//! Startup sequence:
//!   1. Load settings (JSON file, then CLI overrides) and pre-link nodes
//!   2. Start the JSON-RPC 2.0 server
//!   3. Serve until Ctrl-C

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crosslink_core::BlockchainId;
use crosslink_devnode::{DevNode, DevNodeConfig, DevNodeState};

#[derive(Parser, Debug)]
#[command(
    name = "crosslink-devnode",
    version,
    about = "Crosslink development node: simulated cross-chain key generation and locking"
)]
struct Args {
    /// Settings file (JSON). Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-RPC listen address [default: 127.0.0.1:8545].
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,

    /// Duration of each simulated key generation phase, in milliseconds.
    #[arg(long)]
    keygen_step_ms: Option<u64>,

    /// Leave generated keys inactive until `cross_activateKey` is called.
    #[arg(long, default_value_t = false)]
    manual_activation: bool,

    /// Linked nodes to register at startup, as `<blockchain-id>=<host:port>`
    /// (comma-separated).
    #[arg(long, value_delimiter = ',')]
    link: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,crosslink=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DevNodeConfig::default(),
    };
    if let Some(addr) = args.rpc_addr {
        config.rpc_addr = addr;
    }
    if let Some(step) = args.keygen_step_ms {
        config.keygen_step_ms = step;
    }
    if args.manual_activation {
        config.auto_activate = false;
    }
    info!(?config, "crosslink dev node starting");

    let state = Arc::new(DevNodeState::new(&config));
    for entry in &args.link {
        let (id, endpoint) = parse_link(entry)?;
        state.ledger().add_linked_node(id, endpoint.to_string());
        info!(blockchain_id = %id, endpoint, "linked node registered");
    }

    let (addr, handle) = DevNode::new(Arc::clone(&state))
        .start(config.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!(%addr, "node ready");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");
    handle.stop().context("stopping RPC server")?;
    handle.stopped().await;
    Ok(())
}

fn load_config(path: &PathBuf) -> anyhow::Result<DevNodeConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing config {}", path.display()))
}

/// Split a `--link` entry into its blockchain id and endpoint.
fn parse_link(entry: &str) -> anyhow::Result<(BlockchainId, &str)> {
    let (id, endpoint) = entry
        .split_once('=')
        .with_context(|| format!("--link {entry:?}: expected <blockchain-id>=<host:port>"))?;
    let id: BlockchainId = id
        .parse()
        .with_context(|| format!("--link {entry:?}: bad blockchain id"))?;
    crosslink_core::validate_endpoint(endpoint)
        .with_context(|| format!("--link {entry:?}: bad endpoint"))?;
    Ok((id, endpoint))
}
