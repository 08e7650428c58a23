// Copyright (c) 2026 Orchard Ledger Contributors. MIT License.
// See LICENSE for details.

//! # Orchard Node
//!
//! Entry point for the `orchard-node` binary. Parses CLI arguments,
//! initializes logging, and dispatches to a subcommand:
//!
//! - `init`    — create a data directory holding a party ledger key and name
//! - `demo`    — run a stamp-for-basket redemption on an in-process network
//! - `version` — print build version information

mod cli;
mod logging;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use orchard_protocol::asset::{Basket, Stamp, StateKind};
use orchard_protocol::config::FlowConfig;
use orchard_protocol::crypto::PartyKeypair;
use orchard_protocol::flow::{FlowOutcome, PartyContext, RedeemFlow, RedeemRequest, RedeemResponder};
use orchard_protocol::identity::{InMemoryDirectory, PartyInfo, PartyName};
use orchard_protocol::notary::UniquenessNotary;
use orchard_protocol::session::InProcessNetwork;
use orchard_protocol::vault::{MemoryVault, SledVault, StateStore};

use cli::{Commands, OrchardNodeCli};

const DEMO_SELLER: &str = "O=Seller, L=London, C=GB";
const DEMO_BUYER: &str = "O=Buyer, L=New York, C=US";
const DEMO_NOTARY: &str = "O=Notary, L=London, C=GB";

const KEY_FILE: &str = "party.key";
const NAME_FILE: &str = "party.name";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = OrchardNodeCli::parse();
    let format = cli.log_format;

    match cli.command {
        Commands::Init(args) => {
            logging::init_logging("orchard_node=info", format);
            init_node(args)
        }
        Commands::Demo(args) => {
            logging::init_logging("orchard_node=info,orchard_protocol=info", format);
            run_demo(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Ledger key and party name a data directory was initialized with.
struct NodeIdentity {
    name: PartyName,
    keypair: PartyKeypair,
}

/// Generate a key for `party` and store both under `data_dir`.
fn write_identity(data_dir: &Path, party: &str) -> Result<NodeIdentity> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let keypair = PartyKeypair::generate();
    let key_path = data_dir.join(KEY_FILE);
    std::fs::write(&key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write party key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict {}", key_path.display()))?;
    }

    let name_path = data_dir.join(NAME_FILE);
    std::fs::write(&name_path, party)
        .with_context(|| format!("failed to write party name to {}", name_path.display()))?;

    Ok(NodeIdentity {
        name: PartyName::new(party),
        keypair,
    })
}

/// The identity stored under `data_dir`, or `None` before `init`.
fn read_identity(data_dir: &Path) -> Result<Option<NodeIdentity>> {
    let key_path = data_dir.join(KEY_FILE);
    if !key_path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&key_path)
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    let keypair = PartyKeypair::from_hex(&raw)
        .map_err(|e| anyhow!("invalid party key in {}: {e}", key_path.display()))?;

    let name_path = data_dir.join(NAME_FILE);
    let name = std::fs::read_to_string(&name_path)
        .with_context(|| format!("failed to read {}", name_path.display()))?;

    Ok(Some(NodeIdentity {
        name: PartyName::new(name.trim()),
        keypair,
    }))
}

/// Creates a data directory holding a fresh ledger key and the party name.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), party = %args.party, "initializing node");

    if data_dir.join(KEY_FILE).exists() {
        bail!("{} is already initialized", data_dir.display());
    }
    let identity = write_identity(data_dir, &args.party)?;
    let public_key = identity.keypair.public_key();
    tracing::info!(public_key = %public_key, party = %identity.name, "party keypair generated");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Party          : {}", identity.name);
    println!("  Ledger key     : {}", data_dir.join(KEY_FILE).display());
    println!("  Public key     : {}", public_key);

    Ok(())
}

/// Flow configuration from an optional JSON file, with CLI/env overrides
/// applied on top.
fn load_flow_config(args: &cli::DemoArgs) -> Result<FlowConfig> {
    let mut config = match &args.config {
        Some(path) => read_flow_config(path)?,
        None => FlowConfig::new(PartyName::new(DEMO_NOTARY)),
    };
    if let Some(notary) = &args.notary {
        config.notary = PartyName::new(notary.as_str());
    }
    if let Some(ms) = args.session_timeout_ms {
        config.session_timeout = Duration::from_millis(ms);
    }
    config.validate().context("invalid flow configuration")?;
    Ok(config)
}

fn read_flow_config(path: &Path) -> Result<FlowConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid flow configuration in {}", path.display()))
}

/// What the demo prints on success or failure.
#[derive(Debug, Serialize)]
struct DemoReport {
    outcome: String,
    committed: bool,
    tx_id: Option<String>,
    kind: Option<String>,
    history: Vec<String>,
    buyer_baskets: usize,
}

impl DemoReport {
    fn new(outcome: &FlowOutcome, buyer_baskets: usize) -> Self {
        Self {
            outcome: outcome.to_string(),
            committed: outcome.is_committed(),
            tx_id: outcome.tx_id().map(|id| id.to_hex()),
            kind: outcome.kind().map(|k| k.to_string()),
            history: outcome.history().iter().map(|s| format!("{s:?}")).collect(),
            buyer_baskets,
        }
    }
}

/// Runs one redemption between a seller, a buyer, and a notary, all
/// in-process.
async fn run_demo(args: cli::DemoArgs) -> Result<()> {
    let config = load_flow_config(&args)?;
    tracing::info!(
        notary = %config.notary,
        session_timeout_ms = config.session_timeout.as_millis() as u64,
        "starting redemption demo"
    );

    let NodeIdentity {
        name: seller_name,
        keypair: seller,
    } = match &args.data_dir {
        Some(dir) => match read_identity(dir)? {
            Some(identity) => identity,
            None => write_identity(dir, DEMO_SELLER)?,
        },
        None => NodeIdentity {
            name: PartyName::new(DEMO_SELLER),
            keypair: PartyKeypair::generate(),
        },
    };
    let buyer = PartyKeypair::generate();
    let notary_kp = PartyKeypair::generate();

    // --- Membership ---
    let seller_info = PartyInfo::new(seller_name, seller.public_key());
    let buyer_info = PartyInfo::new(PartyName::new(DEMO_BUYER), buyer.public_key());
    let directory = InMemoryDirectory::new(seller_info.clone());
    directory.register(PartyInfo::new(config.notary.clone(), notary_kp.public_key()));

    // --- Notary and network ---
    let notary = Arc::new(UniquenessNotary::new(config.notary.clone(), notary_kp));
    let network = InProcessNetwork::new();

    // --- Vaults ---
    let seller_vault: Arc<dyn StateStore> = match &args.data_dir {
        Some(dir) => {
            let path = dir.join("vault");
            std::fs::create_dir_all(&path)
                .with_context(|| format!("failed to create vault directory {}", path.display()))?;
            let vault = SledVault::open(&path, seller.public_key())
                .with_context(|| format!("failed to open vault at {}", path.display()))?;
            tracing::info!(path = %path.display(), party = %seller_info.name, "seller vault opened");
            Arc::new(vault)
        }
        None => Arc::new(MemoryVault::new(seller.public_key())),
    };
    let buyer_vault = Arc::new(MemoryVault::new(buyer.public_key()));

    // --- Buyer responder ---
    let inbox = network.register(buyer_info.name.clone());
    let responder = Arc::new(RedeemResponder::new(PartyContext {
        keypair: buyer.clone(),
        vault: buyer_vault.clone(),
        directory: Arc::new(directory.view_as(buyer_info.clone())),
        messaging: Arc::new(network.endpoint(buyer_info.name.clone())),
        notary: notary.clone(),
        config: config.clone(),
    }));
    let responder_task = responder.serve(inbox);

    // --- Issuance ---
    let stamp = Stamp::new("Redeem for one basket of apples", seller.public_key());
    seller_vault
        .seed(vec![stamp.clone().into()])
        .context("failed to issue stamp")?;
    for _ in 0..args.baskets {
        let basket = Basket::new("apples", "Orchard Farm", seller.public_key(), args.weight);
        seller_vault
            .seed(vec![basket.into()])
            .context("failed to issue basket")?;
    }
    tracing::info!(stamp_id = %stamp.id, baskets = args.baskets, "seller stock issued");

    // --- Redemption ---
    let flow = RedeemFlow::new(Arc::new(PartyContext {
        keypair: seller,
        vault: Arc::clone(&seller_vault),
        directory: Arc::new(directory.view_as(seller_info.clone())),
        messaging: Arc::new(network.endpoint(seller_info.name.clone())),
        notary,
        config,
    }));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling redemption");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = flow
        .call_with_cancel(RedeemRequest::new(buyer_info.name.clone(), stamp.id), cancel_rx)
        .await;
    interrupt.abort();

    let buyer_baskets = buyer_vault
        .unconsumed_of_kind(StateKind::Basket)
        .context("failed to read buyer vault")?
        .len();
    let report = DemoReport::new(&outcome, buyer_baskets);

    // Closing the buyer's inbox ends its responder loop.
    network.deregister(&buyer_info.name);
    responder_task.await.context("responder task panicked")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode report")?
        );
    } else {
        println!("{}", report.outcome);
        println!("  States     : {}", report.history.join(" -> "));
        println!("  Buyer holds: {} basket(s)", report.buyer_baskets);
    }

    if !report.committed {
        bail!("redemption did not commit: {}", report.outcome);
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("orchard-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", orchard_protocol::config::PROTOCOL_VERSION);
}
