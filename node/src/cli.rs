//! # CLI Interface
//!
//! Command-line structure for `custody-node`, via `clap` derive. Global
//! options locate the store and the engine config; subcommands query the
//! store or inspect the config.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Custody transaction store inspector.
///
/// Reads the pending-transaction store an engine deployment writes to and
/// reports which transactions are waiting on whom.
#[derive(Parser, Debug)]
#[command(
    name = "custody-node",
    about = "Custody transaction store inspector",
    version,
    propagate_version = true
)]
pub struct CustodyCli {
    /// Directory holding the sled store. The store lives in `pending/`.
    #[arg(
        long,
        short = 'd',
        env = "CUSTODY_DATA_DIR",
        default_value = "./custody-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Engine configuration file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "CUSTODY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(
        long,
        env = "CUSTODY_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List open transactions waiting on a key, as signer or approver.
    ToSign(AccountArgs),
    /// List every transaction an account initiated.
    Initiated(AccountArgs),
    /// Print one transaction as JSON.
    Show(ShowArgs),
    /// Inspect the engine configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// Hex-encoded Ed25519 public key.
    pub account: String,

    /// Emit JSON instead of one summary line per transaction.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Transaction id.
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Load and validate the config, reporting the first problem.
    Validate,
    /// Print the effective config as JSON.
    Print,
}
