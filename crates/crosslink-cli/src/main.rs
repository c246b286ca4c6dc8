//! crosslink
//!
//! Command-line front end for a node's `cross` JSON-RPC namespace: threshold
//! key generation, the linked node and coordination contract registry, lock
//! queries, subordinate views and raw transaction relay. Privacy groups and
//! node operation calls are exposed alongside.
//!
//! Usage:
//!   crosslink keygen start         --threshold <n> [--crypto-system <name>]
//!   crosslink keygen status        --key-version <v>
//!   crosslink keygen wait          --key-version <v> [--deadline-secs <s>]
//!   crosslink keygen activate      --key-version <v>
//!   crosslink keygen public-key    [--key-version <v>]
//!   crosslink nodes add            --blockchain-id <id> --endpoint <host:port>
//!   crosslink contracts list
//!   crosslink lock is-locked       --address <0x..> [--block <param>]
//!   crosslink lock process-view    --view <0x..> [--expect-key <v>]
//!   crosslink relay send           --tx <0x..>
//!   crosslink privacy create       --member <base64>... --name <n>
//!   crosslink privacy find         --member <base64>...
//!   crosslink node miner-stop
//!   crosslink node trace           --tx-hash <0x..> [--disable storage,memory]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use crosslink_client::{ClientConfig, CrossClient};
use crosslink_core::encoding::{from_prefixed_hex, to_prefixed_hex};
use crosslink_core::{
    Address, Base64String, BlockParameter, BlockchainId, KeyVersion, SignedSubordinateView,
    ThresholdCryptoSystem,
};
use crosslink_rpc::HttpTransport;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "crosslink",
    version,
    about = "Crosslink client: cross-chain key generation, locking and relay"
)]
struct Args {
    /// Client settings file (JSON). Flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node RPC endpoint [default: http://127.0.0.1:8545].
    #[arg(long, global = true)]
    rpc: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Extra attempts for read-only queries after a transport failure.
    #[arg(long, global = true)]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Threshold key generation rounds.
    #[command(subcommand)]
    Keygen(KeygenCommand),

    /// Linked nodes taking part in key generation.
    #[command(subcommand)]
    Nodes(NodesCommand),

    /// Coordination contracts and the key generation contract.
    #[command(subcommand)]
    Contracts(ContractsCommand),

    /// Lock state and subordinate views.
    #[command(subcommand)]
    Lock(LockCommand),

    /// Cross-chain transaction relay.
    #[command(subcommand)]
    Relay(RelayCommand),

    /// Privacy groups and private transactions.
    #[command(subcommand)]
    Privacy(PrivacyCommand),

    /// Block production and transaction tracing.
    #[command(subcommand)]
    Node(NodeCommand),
}

#[derive(Subcommand, Debug)]
enum KeygenCommand {
    /// Start a key generation round over the linked nodes.
    Start {
        #[arg(long)]
        threshold: u32,
        #[arg(long, default_value = "ALT_BN_128_WITH_KECCAK256")]
        crypto_system: ThresholdCryptoSystem,
    },
    /// Print the status of a key version.
    Status {
        #[arg(long)]
        key_version: u64,
    },
    /// Poll a key version until it settles.
    Wait {
        #[arg(long)]
        key_version: u64,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 300)]
        deadline_secs: u64,
    },
    /// Print why a failed round failed.
    FailureReason {
        #[arg(long)]
        key_version: u64,
    },
    /// List nodes that dropped out of a round.
    DroppedNodes {
        #[arg(long)]
        key_version: u64,
    },
    /// List nodes holding shares of a generated key.
    ActiveNodes {
        #[arg(long)]
        key_version: u64,
    },
    /// Print the active key version.
    ActiveVersion,
    /// Activate a generated key.
    Activate {
        #[arg(long)]
        key_version: u64,
    },
    /// Print a key's public key (the active key when no version is given).
    PublicKey {
        #[arg(long)]
        key_version: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum NodesCommand {
    Add {
        #[arg(long)]
        blockchain_id: BlockchainId,
        /// Node endpoint as `host:port`.
        #[arg(long)]
        endpoint: String,
    },
    Remove {
        #[arg(long)]
        blockchain_id: BlockchainId,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum ContractsCommand {
    Add {
        #[arg(long)]
        blockchain_id: BlockchainId,
        #[arg(long)]
        address: Address,
        /// Endpoint of the blockchain's node as `host:port`.
        #[arg(long)]
        endpoint: String,
    },
    Remove {
        #[arg(long)]
        blockchain_id: BlockchainId,
        #[arg(long)]
        address: Address,
    },
    List,
    /// Point future key generation rounds at a membership contract.
    SetKeygen {
        #[arg(long)]
        address: Address,
    },
}

#[derive(Subcommand, Debug)]
enum LockCommand {
    IsLockable {
        #[arg(long)]
        address: Address,
        /// `latest`, `pending`, `earliest`, a block number or a block hash.
        #[arg(long, default_value = "latest")]
        block: BlockParameter,
    },
    IsLocked {
        #[arg(long)]
        address: Address,
        #[arg(long, default_value = "latest")]
        block: BlockParameter,
    },
    CheckUnlock {
        #[arg(long)]
        address: Address,
    },
    /// Submit a signed subordinate view exactly as encoded by the
    /// subordinate chain (`0x` hex).
    ProcessView {
        #[arg(long)]
        view: SignedSubordinateView,
        /// Refuse unless the node's active key is this version.
        #[arg(long)]
        expect_key: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum RelayCommand {
    /// Relay a signed raw transaction (hex).
    Send {
        #[arg(long)]
        tx: String,
    },
}

#[derive(Subcommand, Debug)]
enum PrivacyCommand {
    /// Create a privacy group over enclave public keys.
    Create {
        #[arg(long = "member", required = true)]
        members: Vec<Base64String>,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List groups whose members are exactly the given keys.
    Find {
        #[arg(long = "member", required = true)]
        members: Vec<Base64String>,
    },
    Delete {
        #[arg(long)]
        group: Base64String,
    },
    /// Private nonce of an account within a group.
    Nonce {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        group: Base64String,
    },
    Transaction {
        #[arg(long)]
        tx_hash: String,
    },
    Receipt {
        #[arg(long)]
        tx_hash: String,
    },
    PrecompileAddress,
}

#[derive(Subcommand, Debug)]
enum NodeCommand {
    MinerStart,
    MinerStop,
    /// Print the opcode trace of a transaction as JSON.
    Trace {
        #[arg(long)]
        tx_hash: String,
        /// Trace sections to leave out: storage, memory, stack.
        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,crosslink_cli=info")
        .init();

    let args = Args::parse();
    let config = client_config(&args)?;
    info!(url = %config.url, "connecting");
    let client = CrossClient::connect(config).context("building RPC client")?;

    match args.command {
        Command::Keygen(cmd) => cmd_keygen(&client, cmd).await,
        Command::Nodes(cmd) => cmd_nodes(&client, cmd).await,
        Command::Contracts(cmd) => cmd_contracts(&client, cmd).await,
        Command::Lock(cmd) => cmd_lock(&client, cmd).await,
        Command::Relay(RelayCommand::Send { tx }) => {
            let bytes = from_prefixed_hex(&tx, "transaction")?;
            let hash = client.relay().send_cross_chain_raw_transaction(&bytes).await?;
            println!("Submitted: {hash}");
            Ok(())
        }
        Command::Privacy(cmd) => cmd_privacy(&client, cmd).await,
        Command::Node(cmd) => cmd_node(&client, cmd).await,
    }
}

type Client = CrossClient<HttpTransport>;

// ── Key generation ────────────────────────────────────────────────────────────

async fn cmd_keygen(client: &Client, cmd: KeygenCommand) -> anyhow::Result<()> {
    let keygen = client.keygen();
    match cmd {
        KeygenCommand::Start { threshold, crypto_system } => {
            let version = keygen.start_threshold_key_generation(threshold, crypto_system).await?;
            println!("Key version: {version}");
        }
        KeygenCommand::Status { key_version } => {
            println!("{}", keygen.get_key_status(KeyVersion(key_version)).await?);
        }
        KeygenCommand::Wait { key_version, deadline_secs } => {
            let status = keygen
                .wait_for_terminal(
                    KeyVersion(key_version),
                    client.config().poll_interval(),
                    Duration::from_secs(deadline_secs),
                )
                .await?;
            println!("{status}");
        }
        KeygenCommand::FailureReason { key_version } => {
            println!("{}", keygen.get_key_gen_failure_reason(KeyVersion(key_version)).await?);
        }
        KeygenCommand::DroppedNodes { key_version } => {
            let nodes = keygen
                .get_key_gen_nodes_dropped_out_of_key_generation(KeyVersion(key_version))
                .await?;
            for node in nodes {
                println!("{node}");
            }
        }
        KeygenCommand::ActiveNodes { key_version } => {
            for node in keygen.get_key_active_nodes(KeyVersion(key_version)).await? {
                println!("{node}");
            }
        }
        KeygenCommand::ActiveVersion => {
            println!("{}", keygen.get_active_key_version().await?);
        }
        KeygenCommand::Activate { key_version } => {
            keygen.activate_key(KeyVersion(key_version)).await?;
            println!("Activated key version {key_version}");
        }
        KeygenCommand::PublicKey { key_version } => {
            let key = keygen.get_blockchain_public_key(key_version.map(KeyVersion)).await?;
            println!("{}", key.to_hex());
        }
    }
    Ok(())
}

// ── Registry ──────────────────────────────────────────────────────────────────

async fn cmd_nodes(client: &Client, cmd: NodesCommand) -> anyhow::Result<()> {
    let registry = client.registry();
    match cmd {
        NodesCommand::Add { blockchain_id, endpoint } => {
            registry.add_linked_node(blockchain_id, &endpoint).await?;
            println!("Linked blockchain {blockchain_id} at {endpoint}");
        }
        NodesCommand::Remove { blockchain_id } => {
            registry.remove_linked_node(blockchain_id).await?;
            println!("Unlinked blockchain {blockchain_id}");
        }
        NodesCommand::List => {
            for node in registry.list_linked_nodes().await? {
                println!("{:<12} {}", node.blockchain_id, node.endpoint);
            }
        }
    }
    Ok(())
}

async fn cmd_contracts(client: &Client, cmd: ContractsCommand) -> anyhow::Result<()> {
    let registry = client.registry();
    match cmd {
        ContractsCommand::Add { blockchain_id, address, endpoint } => {
            registry.add_coordination_contract(blockchain_id, &address, &endpoint).await?;
            println!("Registered {address} on blockchain {blockchain_id}");
        }
        ContractsCommand::Remove { blockchain_id, address } => {
            registry.remove_coordination_contract(blockchain_id, &address).await?;
            println!("Removed {address} on blockchain {blockchain_id}");
        }
        ContractsCommand::List => {
            for c in registry.list_coordination_contracts().await? {
                println!("{:<12} {} {}", c.blockchain_id, c.address, c.endpoint);
            }
        }
        ContractsCommand::SetKeygen { address } => {
            registry.set_key_generation_contract_address(&address).await?;
            println!("Key generation contract: {address}");
        }
    }
    Ok(())
}

// ── Locking ───────────────────────────────────────────────────────────────────

async fn cmd_lock(client: &Client, cmd: LockCommand) -> anyhow::Result<()> {
    let locks = client.locks();
    match cmd {
        LockCommand::IsLockable { address, block } => {
            println!("{}", locks.is_lockable(&address, block).await?);
        }
        LockCommand::IsLocked { address, block } => {
            println!("{}", locks.is_locked(&address, block).await?);
        }
        LockCommand::CheckUnlock { address } => {
            println!("{}", locks.check_unlock(&address).await?);
        }
        LockCommand::ProcessView { view, expect_key } => {
            let receipt = locks.process_subordinate_view(&view, expect_key.map(KeyVersion)).await?;
            println!("View hash:   {}", to_prefixed_hex(&receipt.view_hash));
            println!("Key version: {}", receipt.key_version);
        }
    }
    Ok(())
}

// ── Privacy and node operation ────────────────────────────────────────────────

async fn cmd_privacy(client: &Client, cmd: PrivacyCommand) -> anyhow::Result<()> {
    let privacy = client.privacy();
    match cmd {
        PrivacyCommand::Create { members, name, description } => {
            let id = privacy.create_privacy_group(&members, &name, &description).await?;
            println!("Privacy group: {id}");
        }
        PrivacyCommand::Find { members } => {
            for group in privacy.find_privacy_group(&members).await? {
                println!("{} {:<10} {} ({})", group.id, group.kind, group.name, group.description);
            }
        }
        PrivacyCommand::Delete { group } => {
            if !privacy.delete_privacy_group(&group).await? {
                bail!("node did not delete privacy group {group}");
            }
            println!("Deleted privacy group {group}");
        }
        PrivacyCommand::Nonce { address, group } => {
            println!("{}", privacy.get_transaction_count(&address, &group).await?);
        }
        PrivacyCommand::Transaction { tx_hash } => {
            print_json(privacy.get_private_transaction(&tx_hash).await?)?;
        }
        PrivacyCommand::Receipt { tx_hash } => {
            print_json(privacy.get_transaction_receipt(&tx_hash).await?)?;
        }
        PrivacyCommand::PrecompileAddress => {
            println!("{}", privacy.get_privacy_precompile_address().await?);
        }
    }
    Ok(())
}

async fn cmd_node(client: &Client, cmd: NodeCommand) -> anyhow::Result<()> {
    let operator = client.operator();
    match cmd {
        NodeCommand::MinerStart => {
            operator.miner_start().await?;
            println!("Block production started");
        }
        NodeCommand::MinerStop => {
            println!("{}", operator.miner_stop().await?);
        }
        NodeCommand::Trace { tx_hash, disable } => {
            let trace = operator.debug_trace_transaction(&tx_hash, &trace_options(&disable)).await?;
            print_json(Some(trace))?;
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing config {} as client settings", path.display()))?
        }
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.rpc {
        config.url = url.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout_secs = secs;
    }
    if let Some(retries) = args.retries {
        config.query_retries = retries;
    }
    if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
        bail!("RPC endpoint {:?} is not an http(s) URL", config.url);
    }
    Ok(config)
}

/// Map `storage,memory` onto `{"disableStorage": true, "disableMemory": true}`.
fn trace_options(disable: &[String]) -> BTreeMap<String, bool> {
    disable
        .iter()
        .map(|section| {
            let mut chars = section.trim().chars();
            let capitalised: String = chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default();
            (format!("disable{capitalised}"), true)
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: Option<T>) -> anyhow::Result<()> {
    match value {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => println!("null"),
    }
    Ok(())
}
