//! The indexer control loop.
//!
//! Connecting → Streaming → (Dispatching → Streaming)* → Reconnecting →
//! Streaming | Stopped. One sequential loop per indexer identity: blocks are
//! dispatched in increasing height order, events within a block in their
//! original index order, and the cursor for a block is committed only after
//! every event in it has been written or skipped.
//!
//! Stream faults (timeout, disconnect, reorg signal) are transient: the loop
//! reopens the subscription from the last committed cursor with bounded
//! exponential backoff and unbounded attempts. Redelivered events are
//! absorbed by the writers' dedup keys, so at-least-once delivery yields an
//! exactly-once effect.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::cursor::{Cursor, CursorStore, Finality};
use super::event::{Block, EventContext, Network};
use super::filter::SharedFilter;
use super::retry::{Backoff, RetryPolicy};
use super::schema::EventSchemaRegistry;
use super::stream::{ChainStream, StreamMessage, SystemMessageLevel};
use super::writer::WriteOutcome;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Identity under which the cursor is persisted. At most one process may
    /// run a given identity against the same cursor store.
    pub indexer_id: String,

    pub network: Network,

    /// First block to index when no cursor has been persisted yet.
    pub starting_block: u64,

    pub finality: Finality,

    /// Fixed-point scale for amount decoding.
    pub decimals: u32,

    /// Bounded stream-read timeout; expiry is a transient fault.
    pub read_timeout: Duration,

    /// Reconnect backoff (unbounded attempts, bounded delay).
    pub reconnect_backoff: Backoff,

    /// Bounded retry for cursor commits; exhaustion is fatal.
    pub commit_retry: RetryPolicy,
}

impl DispatcherConfig {
    pub fn new(indexer_id: impl Into<String>, network: Network) -> Self {
        Self {
            indexer_id: indexer_id.into(),
            network,
            starting_block: 0,
            finality: Finality::Accepted,
            decimals: 18,
            read_timeout: Duration::from_secs(40),
            reconnect_backoff: Backoff::default(),
            commit_retry: RetryPolicy::default(),
        }
    }
}

/// Counters accumulated over the dispatcher's lifetime, mirrored into
/// `metrics` counters as they grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub blocks: u64,
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
    pub unknown_selectors: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
}

enum BlockOutcome {
    /// All events written or skipped; cursor committed.
    Committed(Cursor),
    /// Shutdown observed mid-block; cursor untouched.
    Interrupted,
}

pub struct IndexerDispatcher {
    config: DispatcherConfig,
    stream: Arc<dyn ChainStream>,
    registry: EventSchemaRegistry,
    cursor_store: CursorStore,
    filter: SharedFilter,
    shutdown: CancellationToken,
    stats: DispatchStats,
}

impl IndexerDispatcher {
    pub fn new(
        config: DispatcherConfig,
        stream: Arc<dyn ChainStream>,
        registry: EventSchemaRegistry,
        cursor_store: CursorStore,
        filter: SharedFilter,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            stream,
            registry,
            cursor_store,
            filter,
            shutdown,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Run until shutdown. Returns the accumulated stats on a graceful stop;
    /// the only fatal errors are failing to load the cursor at startup and
    /// exhausting the commit retry policy.
    pub async fn run(mut self) -> Result<DispatchStats> {
        let indexer_id = self.config.indexer_id.clone();

        let mut cursor = self
            .cursor_store
            .load(&indexer_id)
            .await
            .context("failed to load cursor")?;

        match &cursor {
            Some(c) => tracing::info!(
                target: "ember::dispatcher",
                indexer_id = %indexer_id,
                block_number = c.block_number,
                "resuming from persisted cursor"
            ),
            None => {
                if self.config.starting_block > 0 {
                    cursor = Some(Cursor::genesis(
                        self.config.starting_block,
                        self.config.finality,
                    ));
                }
                tracing::info!(
                    target: "ember::dispatcher",
                    indexer_id = %indexer_id,
                    starting_block = self.config.starting_block,
                    "no persisted cursor, starting from genesis height"
                );
            }
        }

        match self.stream.status().await {
            Ok(status) => tracing::info!(
                target: "ember::dispatcher",
                indexer_id = %indexer_id,
                head_block = ?status.head_block,
                "chain stream reachable"
            ),
            Err(e) => tracing::warn!(
                target: "ember::dispatcher",
                indexer_id = %indexer_id,
                error = %e,
                "chain stream status probe failed"
            ),
        }

        let mut backoff = self.config.reconnect_backoff.clone();

        'connect: loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let filter_generation = self.filter.generation();
            let filter = self.filter.snapshot();

            let mut messages = match self
                .stream
                .subscribe(filter, cursor.clone(), self.config.finality)
                .await
            {
                Ok(stream) => {
                    backoff.reset();
                    stream
                }
                Err(e) => {
                    self.stats.reconnects += 1;
                    metrics::counter!("ember_stream_reconnects_total").increment(1);
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        target: "ember::dispatcher",
                        indexer_id = %indexer_id,
                        error = %e,
                        retry_in = ?delay,
                        "failed to open stream"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break 'connect,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            tracing::info!(
                target: "ember::dispatcher",
                indexer_id = %indexer_id,
                cursor = ?cursor.as_ref().map(|c| c.block_number),
                "streaming"
            );

            'streaming: loop {
                let message = tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!(
                            target: "ember::dispatcher",
                            indexer_id = %indexer_id,
                            "shutdown observed while streaming"
                        );
                        break 'connect;
                    }
                    msg = tokio::time::timeout(self.config.read_timeout, messages.next()) => msg,
                };

                match message {
                    Err(_elapsed) => {
                        tracing::warn!(
                            target: "ember::dispatcher",
                            indexer_id = %indexer_id,
                            timeout = ?self.config.read_timeout,
                            "stream read timed out, reconnecting"
                        );
                        break 'streaming;
                    }
                    Ok(None) => {
                        tracing::warn!(
                            target: "ember::dispatcher",
                            indexer_id = %indexer_id,
                            "stream ended, reconnecting"
                        );
                        break 'streaming;
                    }
                    Ok(Some(Err(e))) => {
                        tracing::warn!(
                            target: "ember::dispatcher",
                            indexer_id = %indexer_id,
                            error = %e,
                            "stream fault, reconnecting"
                        );
                        break 'streaming;
                    }
                    Ok(Some(Ok(StreamMessage::System(msg)))) => {
                        match msg.level {
                            SystemMessageLevel::Info => tracing::info!(
                                target: "ember::dispatcher",
                                indexer_id = %indexer_id,
                                "stream message: {}",
                                msg.text
                            ),
                            SystemMessageLevel::Warn => tracing::warn!(
                                target: "ember::dispatcher",
                                indexer_id = %indexer_id,
                                "stream message: {}",
                                msg.text
                            ),
                        }
                    }
                    Ok(Some(Ok(StreamMessage::Data(batch)))) => {
                        for block in &batch.blocks {
                            match self.dispatch_block(block, cursor.as_ref()).await? {
                                BlockOutcome::Committed(new_cursor) => cursor = Some(new_cursor),
                                BlockOutcome::Interrupted => break 'connect,
                            }

                            if self.shutdown.is_cancelled() {
                                break 'connect;
                            }
                            if self.filter.generation() != filter_generation {
                                tracing::info!(
                                    target: "ember::dispatcher",
                                    indexer_id = %indexer_id,
                                    "filter extended, reopening subscription"
                                );
                                // Not a fault: resubscribe immediately from
                                // the committed cursor.
                                continue 'connect;
                            }
                        }
                    }
                }
            }

            self.stats.reconnects += 1;
            metrics::counter!("ember_stream_reconnects_total").increment(1);
            let delay = backoff.next_delay();
            tokio::select! {
                _ = self.shutdown.cancelled() => break 'connect,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(
            target: "ember::dispatcher",
            indexer_id = %indexer_id,
            blocks = self.stats.blocks,
            written = self.stats.written,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "dispatcher stopped"
        );
        Ok(self.stats)
    }

    /// Dispatch every event of a block in index order, then commit the
    /// cursor. A malformed or unhandled event never aborts the block; a
    /// failed cursor commit (after retries) aborts the dispatcher.
    async fn dispatch_block(
        &mut self,
        block: &Block,
        committed: Option<&Cursor>,
    ) -> Result<BlockOutcome> {
        let indexer_id = &self.config.indexer_id;

        for event in &block.events {
            // Shutdown is observed between events, never mid-event; the
            // cursor then stays at the last fully-processed block.
            if self.shutdown.is_cancelled() {
                tracing::info!(
                    target: "ember::dispatcher",
                    indexer_id = %indexer_id,
                    block_number = block.header.number,
                    "shutdown observed mid-block, leaving block uncommitted"
                );
                return Ok(BlockOutcome::Interrupted);
            }

            let Some(selector) = event.selector() else {
                tracing::trace!(
                    target: "ember::dispatcher",
                    indexer_id = %indexer_id,
                    tx_hash = %format!("{:#x}", event.transaction_hash),
                    "event without selector, skipping"
                );
                continue;
            };

            let Some(registered) = self.registry.resolve(&selector) else {
                self.stats.unknown_selectors += 1;
                metrics::counter!("ember_events_unknown_total").increment(1);
                tracing::trace!(
                    target: "ember::dispatcher",
                    indexer_id = %indexer_id,
                    selector = %format!("{selector:#x}"),
                    block_number = block.header.number,
                    "unknown selector, skipping"
                );
                continue;
            };

            let ctx = EventContext::new(self.config.network, &block.header, event);

            let decoded = match registered
                .schema
                .decode(event, &ctx, self.config.decimals)
            {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.stats.decode_failures += 1;
                    metrics::counter!("ember_events_decode_failed_total").increment(1);
                    tracing::warn!(
                        target: "ember::dispatcher",
                        indexer_id = %indexer_id,
                        event = registered.schema.name,
                        selector = %format!("{selector:#x}"),
                        tx_hash = %ctx.transaction_hash,
                        block_number = block.header.number,
                        error = %e,
                        "decode failed, skipping event"
                    );
                    continue;
                }
            };

            if !registered.writer.accepts(decoded.record_type()) {
                tracing::warn!(
                    target: "ember::dispatcher",
                    indexer_id = %indexer_id,
                    event = registered.schema.name,
                    writer = registered.writer.name(),
                    "writer rejected record type, skipping event"
                );
                continue;
            }

            let outcome = registered.writer.write(&decoded).await;
            match &outcome {
                WriteOutcome::Written => {
                    self.stats.written += 1;
                    metrics::counter!("ember_events_written_total").increment(1);
                }
                WriteOutcome::Skipped => {
                    self.stats.skipped += 1;
                    metrics::counter!("ember_events_skipped_total").increment(1);
                }
                WriteOutcome::Failed(reason) => {
                    self.stats.failed += 1;
                    metrics::counter!("ember_events_failed_total").increment(1);
                    tracing::error!(
                        target: "ember::dispatcher",
                        indexer_id = %indexer_id,
                        event = registered.schema.name,
                        writer = registered.writer.name(),
                        tx_hash = %ctx.transaction_hash,
                        event_index = ctx.event_index,
                        block_number = block.header.number,
                        reason = %reason,
                        "write failed, continuing"
                    );
                }
            }

            tracing::debug!(
                target: "ember::dispatcher",
                indexer_id = %indexer_id,
                event = registered.schema.name,
                tx_hash = %ctx.transaction_hash,
                block_number = block.header.number,
                outcome = outcome.as_str(),
                "event dispatched"
            );
        }

        // Redelivered blocks are dispatched (writers dedup) but must never
        // regress the cursor.
        if let Some(committed) = committed {
            if block.header.number <= committed.block_number {
                return Ok(BlockOutcome::Committed(committed.clone()));
            }
        }

        let new_cursor = Cursor {
            block_number: block.header.number,
            block_hash: super::codec::canonical_hex(&block.header.hash),
            finality: self.config.finality,
        };

        let store = &self.cursor_store;
        let indexer_id_ref = self.config.indexer_id.as_str();
        self.config
            .commit_retry
            .execute(|| store.commit(indexer_id_ref, &new_cursor))
            .await
            .context("cursor commit failed, stopping dispatcher")?;

        self.stats.blocks += 1;
        metrics::counter!("ember_blocks_committed_total").increment(1);

        Ok(BlockOutcome::Committed(new_cursor))
    }
}
