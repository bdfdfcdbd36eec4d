// Copyright (c) 2026 Ledger Custody Contributors. MIT License.
// See LICENSE for details.

//! # Custody Node
//!
//! Entry point for the `custody-node` binary, an operator tool over the
//! engine's persisted pending-transaction store.
//!
//! - `to-sign <key>`: open transactions waiting on a signer or approver
//! - `initiated <account>`: transactions an account started
//! - `show <id>`: one transaction as JSON
//! - `config validate|print`
//! - `version`

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use custody_engine::crypto::keys::AccountId;
use custody_engine::storage::{SledStore, TransactionStore};
use custody_engine::{EngineConfig, PendingTransaction};

use cli::{AccountArgs, Commands, ConfigAction, CustodyCli};

/// Store directory under `--data-dir`.
const STORE_DIR: &str = "pending";

fn main() -> Result<()> {
    let cli = CustodyCli::parse();
    logging::init_logging("custody_node=info,custody_engine=info", cli.log_format);

    match cli.command {
        Commands::ToSign(args) => {
            let store = open_store(&cli.data_dir)?;
            let account = parse_account(&args.account)?;
            let records = store
                .find_to_sign(&account)
                .context("failed to query transactions to sign")?;
            report(&records, &args)
        }
        Commands::Initiated(args) => {
            let store = open_store(&cli.data_dir)?;
            let account = parse_account(&args.account)?;
            let records = store
                .find_by_source(&account)
                .context("failed to query initiated transactions")?;
            report(&records, &args)
        }
        Commands::Show(args) => {
            let store = open_store(&cli.data_dir)?;
            let tx = store
                .find(&args.id)
                .context("failed to read transaction")?
                .with_context(|| format!("transaction {} not found", args.id))?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        Commands::Config { action } => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                ConfigAction::Validate => println!("config ok"),
                ConfigAction::Print => println!("{}", serde_json::to_string_pretty(&config)?),
            }
            Ok(())
        }
        Commands::Version => {
            println!("custody-node {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_store(data_dir: &Path) -> Result<SledStore> {
    let path = data_dir.join(STORE_DIR);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create store directory: {}", path.display()))?;
    let store = SledStore::open(&path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    tracing::info!(path = %path.display(), records = store.len(), "store opened");
    Ok(store)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("invalid engine config {}", path.display())),
        None => {
            let config = EngineConfig::default();
            config.validate().context("invalid default engine config")?;
            Ok(config)
        }
    }
}

fn parse_account(raw: &str) -> Result<AccountId> {
    AccountId::parse(raw).with_context(|| format!("not an account id: {}", raw))
}

fn report(records: &[PendingTransaction], args: &AccountArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for tx in records {
        println!("{}", summary_line(tx));
    }
    tracing::debug!(count = records.len(), "listed transactions");
    Ok(())
}

fn summary_line(tx: &PendingTransaction) -> String {
    let state = if tx.is_submitted() {
        "submitted"
    } else if tx.error().is_some() {
        "failed"
    } else {
        "open"
    };
    format!(
        "{}  {}  {:<9}  weight={}  {}",
        tx.id(),
        tx.hash(),
        state,
        tx.signed_weight(),
        tx.description()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).unwrap();
        assert!(store.is_empty());
        assert!(dir.path().join(STORE_DIR).is_dir());
    }

    #[test]
    fn config_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"network_passphrase":"ops net","base_fee":200}"#).unwrap();
        let config = load_config(Some(&good)).unwrap();
        assert_eq!(config.base_fee, 200);
        assert_eq!(config.network_passphrase, "ops net");

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"base_fee":0}"#).unwrap();
        assert!(load_config(Some(&bad)).is_err());

        assert!(load_config(None).is_ok());
    }

    #[test]
    fn account_ids_are_checked() {
        assert!(parse_account("zz").is_err());
    }
}
