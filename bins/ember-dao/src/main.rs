//! Ember DAO - Starknet DAO factory indexer.
//!
//! Runs as its own process with its own cursor and filter, independent of
//! the launchpad indexer. The factory writer extends the live filter with
//! every DAO the factory deploys, so proposal and vote events from child
//! contracts are picked up without a restart.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use ember::{
    CursorStore, CursorStoreConfig, DispatcherConfig, EventSchemaRegistry, FilterBuilder,
    IndexerDispatcher, JsonRpcChainStream, JsonRpcStreamConfig, SharedFilter,
};
use ember_log_store::LogRecordStore;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting Ember DAO Indexer");
    tracing::info!("Stream URL: {}", config.stream_url);
    tracing::info!("Factory: {}", config.factory_address);
    tracing::info!("Starting block: {}", config.starting_block);
    tracing::info!("Cursor store: {}", config.database_url);

    let factory = config
        .parse_factory()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid DAO_FACTORY_ADDRESS")?;

    let cursor_store = CursorStore::connect(CursorStoreConfig {
        url: config.database_url.clone(),
    })
    .await
    .context("cannot reach cursor store")?;

    let provider = Arc::new(starknet::providers::jsonrpc::JsonRpcClient::new(
        starknet::providers::jsonrpc::HttpTransport::new(
            url::Url::parse(&config.stream_url).context("invalid STREAM_URL")?,
        ),
    ));
    let stream = Arc::new(JsonRpcChainStream::new(
        provider,
        JsonRpcStreamConfig::default(),
    ));

    let store = Arc::new(LogRecordStore::new());

    // The filter starts with just the factory; discovered DAOs join it live.
    let filter = SharedFilter::new(FilterBuilder::new().contract(factory).build());

    let mut registry = EventSchemaRegistry::new();
    ember_dao::register(&mut registry, store, filter.clone())?;
    tracing::info!("Registered {} event schemas", registry.len());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let mut dispatcher_config = DispatcherConfig::new(config.indexer_id.clone(), config.network);
    dispatcher_config.starting_block = config.starting_block;
    dispatcher_config.finality = config.finality;
    dispatcher_config.decimals = config.decimals;
    dispatcher_config.read_timeout = Duration::from_secs(config.read_timeout_secs);

    let dispatcher = IndexerDispatcher::new(
        dispatcher_config,
        stream,
        registry,
        cursor_store,
        filter,
        shutdown,
    );

    let stats = dispatcher.run().await?;
    tracing::info!(
        "Final statistics: {} blocks, {} written, {} skipped, {} failed",
        stats.blocks,
        stats.written,
        stats.skipped,
        stats.failed
    );

    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
        }

        shutdown.cancel();
    });
}
