//! # CLI Interface
//!
//! Defines the command-line argument structure for `orchard-node` using
//! `clap` derive. Supports three subcommands: `init`, `demo`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Orchard ledger node.
///
/// Generates party keys and runs stamp redemptions between a seller, a
/// buyer, and a uniqueness notary.
#[derive(Parser, Debug)]
#[command(
    name = "orchard-node",
    about = "Orchard ledger node",
    version,
    propagate_version = true
)]
pub struct OrchardNodeCli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "ORCHARD_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory holding a fresh party ledger key and name.
    Init(InitArgs),
    /// Run one stamp-for-basket redemption on an in-process network.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "ORCHARD_DATA_DIR", default_value = ".orchard")]
    pub data_dir: PathBuf,

    /// X.500 name of the party that will own the key. `demo --data-dir`
    /// runs the seller under this name.
    #[arg(long, default_value = "O=Seller, L=London, C=GB")]
    pub party: String,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Flow configuration file (JSON). Protocol defaults apply when omitted.
    #[arg(long, short = 'c', env = "ORCHARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the seller from this data directory: its key and name from
    /// `init` (created on first use) and a sled vault under `vault/`.
    #[arg(long, short = 'd', env = "ORCHARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Notary name, overriding the configuration file.
    #[arg(long, env = "ORCHARD_NOTARY")]
    pub notary: Option<String>,

    /// Counterparty wait bound in milliseconds, overriding the configuration
    /// file.
    #[arg(long, env = "ORCHARD_SESSION_TIMEOUT_MS")]
    pub session_timeout_ms: Option<u64>,

    /// Number of baskets the seller owns before redeeming.
    #[arg(long, default_value_t = 1)]
    pub baskets: u32,

    /// Weight of each seeded basket.
    #[arg(long, default_value_t = 10)]
    pub weight: u32,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}
