pub mod cli;
pub mod core;
pub mod engine;
pub mod providers;
pub mod store;

use crate::cli::history::RecordInput;
use crate::core::config::AppConfig;
use crate::core::history::HistoryStore;
use crate::engine::ConversionEngine;
use crate::providers::OpenExchangeRatesProvider;
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Convert {
        base: String,
        target: String,
        amount: Decimal,
    },
    History(HistoryCommand),
}

pub enum HistoryCommand {
    List,
    Show { id: u64 },
    Add(RecordInput),
    Update { id: u64, record: RecordInput },
    Delete { id: u64 },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxconv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.provider.base_url,
        history = ?config.history.backend,
        rate_cache = ?config.cache.backend,
        "Loaded config"
    );

    let history = store::open_history_store(&config)?;

    match command {
        AppCommand::Convert {
            base,
            target,
            amount,
        } => {
            let engine = build_engine(&config, history)?;
            cli::convert::run(&engine, &base, &target, amount).await
        }
        AppCommand::History(HistoryCommand::List) => cli::history::list(history.as_ref()).await,
        AppCommand::History(HistoryCommand::Show { id }) => {
            cli::history::show(history.as_ref(), id).await
        }
        AppCommand::History(HistoryCommand::Add(record)) => {
            cli::history::add(history.as_ref(), record).await
        }
        AppCommand::History(HistoryCommand::Update { id, record }) => {
            cli::history::update(history.as_ref(), id, record).await
        }
        AppCommand::History(HistoryCommand::Delete { id }) => {
            cli::history::delete(history.as_ref(), id).await
        }
    }
}

fn build_engine(
    config: &AppConfig,
    history: Arc<dyn HistoryStore>,
) -> Result<ConversionEngine> {
    let provider = OpenExchangeRatesProvider::new(
        &config.provider.base_url,
        &config.provider.app_id,
        Duration::from_secs(config.provider.timeout_secs),
    )?;

    Ok(ConversionEngine::new(
        Arc::new(provider),
        store::open_rate_cache(config)?,
        history,
        config.engine_config(),
    ))
}
