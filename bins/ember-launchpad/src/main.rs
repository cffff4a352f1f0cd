//! Ember Launchpad - Starknet launchpad and nameservice indexer.
//!
//! Long-running service: opens the chain stream at the persisted cursor,
//! decodes launchpad and nameservice events, and writes exactly-once rows.
//! Exit code 0 on graceful shutdown, non-zero on unrecoverable startup
//! failure (unreachable cursor store, invalid configuration).

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use ember::{
    CursorStore, CursorStoreConfig, DispatchStats, DispatcherConfig, EventSchemaRegistry,
    FilterBuilder, IndexerDispatcher, JsonRpcChainStream, JsonRpcStreamConfig, SharedFilter,
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

    tracing::info!("Starting Ember Launchpad Indexer");
    tracing::info!("Stream URL: {}", config.stream_url);
    tracing::info!("Network: {}", config.network);
    tracing::info!("Starting block: {}", config.starting_block);
    tracing::info!("Cursor store: {}", config.database_url);
    tracing::info!("Decimals: {}", config.decimals);

    let contracts = config
        .parse_contracts()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid CONTRACT_ADDRESSES")?;

    // Startup faults are fatal: exit non-zero so an orchestrator can restart.
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

    let mut registry = EventSchemaRegistry::new();
    ember_launchpad::register(&mut registry, store.clone())?;
    ember_nameservice::register(&mut registry, store)?;
    tracing::info!("Registered {} event schemas", registry.len());

    let filter = SharedFilter::new(
        FilterBuilder::new()
            .contracts(contracts)
            .registry_selectors(&registry)
            .build(),
    );

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
    log_final_stats(&stats);

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

fn log_final_stats(stats: &DispatchStats) {
    tracing::info!("Final statistics:");
    tracing::info!("  Blocks committed: {}", stats.blocks);
    tracing::info!("  Records written: {}", stats.written);
    tracing::info!("  Duplicates skipped: {}", stats.skipped);
    tracing::info!("  Write failures: {}", stats.failed);
    tracing::info!("  Unknown selectors: {}", stats.unknown_selectors);
    tracing::info!("  Decode failures: {}", stats.decode_failures);
}
