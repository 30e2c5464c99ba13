use std::sync::Arc;

use clap::Parser;
use tessera_client::{Sdk, SdkConfig};
use tessera_keystore::{MemoryStore, SecureStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod cli_command;

use crate::cli_args::{Cli, StoreKind};
use crate::cli_command::handle_command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = load_config(&cli);
    init_logging(cli.verbose, config.debug)?;
    info!(
        event = "config_loaded",
        path = %config_path,
        store = ?cli.store,
        publishable_key = config.publishable_key.is_some()
    );

    let store: Arc<dyn SecureStore> = match cli.store {
        StoreKind::Keyring => Arc::from(tessera_keystore::default_store()),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };
    let sdk = Sdk::builder(config).store(store).build()?;
    handle_command(cli.command, &sdk).await
}

fn load_config(cli: &Cli) -> (SdkConfig, String) {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| tessera_client::config::DEFAULT_CONFIG_PATH.to_string());
    let mut config = SdkConfig::load(&path);
    config.apply_env_overrides();
    if let Some(key) = cli.publishable_key.clone() {
        config.publishable_key = Some(key);
    }
    if let Some(base_url) = cli.base_url.clone() {
        config.base_url = Some(base_url);
    }
    if let Some(application_id) = cli.application_id.clone() {
        config.application_id = application_id;
    }
    (config, path)
}

fn init_logging(verbosity: u8, debug: bool) -> anyhow::Result<()> {
    let filter = match (verbosity, debug) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
