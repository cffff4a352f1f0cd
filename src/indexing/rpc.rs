//! JSON-RPC polling implementation of [`ChainStream`].
//!
//! Pulls events with `starknet_getEvents` per filtered contract, paginating
//! through continuation tokens, and assembles them into ordered block
//! batches with header context. When the filter carries no contract
//! constraint a single unfiltered query per range is issued instead.
//!
//! Pre-confirmed blocks are skipped; the stream only delivers blocks whose
//! hash is final enough for the cursor to point at.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_stream::try_stream;
use starknet::core::types::{
    BlockId, EmittedEvent, EventFilter, Felt, MaybePreConfirmedBlockWithTxHashes,
};
use starknet::providers::jsonrpc::{HttpTransport, JsonRpcClient};
use starknet::providers::Provider;
use tokio::time::sleep;

use super::cursor::{Cursor, Finality};
use super::event::{Block, BlockBatch, BlockHeader, RawEvent};
use super::filter::SubscriptionFilter;
use super::retry::RetryPolicy;
use super::stream::{ChainStream, EventStream, StreamError, StreamMessage, StreamStatus};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct JsonRpcStreamConfig {
    /// Events per RPC request (most providers cap at 1024).
    pub chunk_size: u64,

    /// Block range to query per polling iteration.
    pub block_batch_size: u64,

    /// Delay between polls once caught up to the chain head.
    pub poll_interval: Duration,

    /// Retry policy for individual RPC calls.
    pub retry: RetryPolicy,
}

impl Default for JsonRpcStreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            block_batch_size: 200,
            poll_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct JsonRpcChainStream {
    provider: Arc<JsonRpcClient<HttpTransport>>,
    config: JsonRpcStreamConfig,
}

impl JsonRpcChainStream {
    pub fn new(provider: Arc<JsonRpcClient<HttpTransport>>, config: JsonRpcStreamConfig) -> Self {
        Self { provider, config }
    }
}

fn transport_err(err: anyhow::Error) -> StreamError {
    StreamError::Transport(format!("{err:#}"))
}

async fn fetch_contract_events(
    provider: &JsonRpcClient<HttpTransport>,
    retry: &RetryPolicy,
    address: Option<Felt>,
    selectors: &BTreeSet<Felt>,
    from_block: u64,
    to_block: u64,
    chunk_size: u64,
) -> Result<Vec<EmittedEvent>, StreamError> {
    let keys = if selectors.is_empty() {
        None
    } else {
        Some(vec![selectors.iter().copied().collect::<Vec<_>>()])
    };

    let mut events = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let filter = EventFilter {
            from_block: Some(BlockId::Number(from_block)),
            to_block: Some(BlockId::Number(to_block)),
            address,
            keys: keys.clone(),
        };
        let token = continuation_token.clone();

        let page = retry
            .execute(|| {
                let filter = filter.clone();
                let token = token.clone();
                async move {
                    provider
                        .get_events(filter, token, chunk_size)
                        .await
                        .context("failed to fetch events")
                }
            })
            .await
            .map_err(transport_err)?;

        events.extend(page.events);
        continuation_token = page.continuation_token;
        if continuation_token.is_none() {
            break;
        }
    }

    Ok(events)
}

async fn fetch_header(
    provider: &JsonRpcClient<HttpTransport>,
    retry: &RetryPolicy,
    block_number: u64,
) -> Result<Option<BlockHeader>, StreamError> {
    let block = retry
        .execute(|| async move {
            provider
                .get_block_with_tx_hashes(BlockId::Number(block_number))
                .await
                .context("failed to fetch block header")
        })
        .await
        .map_err(transport_err)?;

    match block {
        MaybePreConfirmedBlockWithTxHashes::Block(b) => Ok(Some(BlockHeader {
            number: block_number,
            hash: b.block_hash,
            timestamp: b.timestamp,
        })),
        MaybePreConfirmedBlockWithTxHashes::PreConfirmedBlock(_) => {
            tracing::warn!(
                target: "ember::rpc",
                block_number,
                "skipping pre-confirmed block"
            );
            Ok(None)
        }
    }
}

#[async_trait]
impl ChainStream for JsonRpcChainStream {
    async fn subscribe(
        &self,
        filter: SubscriptionFilter,
        starting: Option<Cursor>,
        _finality: Finality,
    ) -> Result<EventStream, StreamError> {
        let provider = self.provider.clone();
        let config = self.config.clone();
        let mut next_block = starting.map_or(0, |c| c.block_number.saturating_add(1));

        tracing::info!(
            target: "ember::rpc",
            from_block = next_block,
            contracts = filter.contracts.len(),
            selectors = filter.selectors.len(),
            "opening polling subscription"
        );

        let stream = try_stream! {
            loop {
                let head = config
                    .retry
                    .execute(|| async {
                        provider.block_number().await.context("failed to fetch chain head")
                    })
                    .await
                    .map_err(transport_err)?;

                if next_block > head {
                    sleep(config.poll_interval).await;
                    continue;
                }

                let range_end = head.min(next_block + config.block_batch_size - 1);

                let mut events = Vec::new();
                if filter.contracts.is_empty() {
                    events.extend(
                        fetch_contract_events(
                            &provider,
                            &config.retry,
                            None,
                            &filter.selectors,
                            next_block,
                            range_end,
                            config.chunk_size,
                        )
                        .await?,
                    );
                } else {
                    for address in &filter.contracts {
                        events.extend(
                            fetch_contract_events(
                                &provider,
                                &config.retry,
                                Some(*address),
                                &filter.selectors,
                                next_block,
                                range_end,
                                config.chunk_size,
                            )
                            .await?,
                        );
                    }
                }

                // Group by block; events without a block number are
                // pre-confirmed and not safe to index.
                let mut by_block: BTreeMap<u64, Vec<EmittedEvent>> = BTreeMap::new();
                for event in events {
                    match event.block_number {
                        Some(n) => by_block.entry(n).or_default().push(event),
                        None => tracing::debug!(
                            target: "ember::rpc",
                            tx_hash = %format!("{:#x}", event.transaction_hash),
                            "dropping pre-confirmed event"
                        ),
                    }
                }

                // Always include the range end so the cursor advances through
                // stretches with no matching events.
                let mut wanted: BTreeSet<u64> = by_block.keys().copied().collect();
                wanted.insert(range_end);

                let mut blocks = Vec::with_capacity(wanted.len());
                for number in wanted {
                    let Some(header) = fetch_header(&provider, &config.retry, number).await? else {
                        continue;
                    };
                    let raw_events = by_block
                        .remove(&number)
                        .unwrap_or_default()
                        .into_iter()
                        .enumerate()
                        .map(|(index, e)| RawEvent {
                            from_address: e.from_address,
                            keys: e.keys,
                            data: e.data,
                            transaction_hash: e.transaction_hash,
                            event_index: index as u64,
                        })
                        .collect();
                    blocks.push(Block {
                        header,
                        events: raw_events,
                    });
                }

                if !blocks.is_empty() {
                    yield StreamMessage::Data(BlockBatch { blocks });
                }

                next_block = range_end + 1;
            }
        };

        Ok(Box::pin(stream))
    }

    async fn status(&self) -> Result<StreamStatus, StreamError> {
        let head = self
            .provider
            .block_number()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        Ok(StreamStatus {
            head_block: Some(head),
        })
    }
}
