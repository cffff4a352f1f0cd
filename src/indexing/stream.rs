//! Chain stream seam consumed by the dispatcher.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use super::cursor::{Cursor, Finality};
use super::event::BlockBatch;
use super::filter::SubscriptionFilter;

/// Message kinds delivered by a subscription.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// A batch of blocks with events, in increasing height order.
    Data(BlockBatch),
    /// Informational only; logged, never acted on.
    System(SystemMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessageLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone)]
pub struct SystemMessage {
    pub level: SystemMessageLevel,
    pub text: String,
}

/// Stream-level faults. All of these are transient from the dispatcher's
/// point of view: it reconnects from the last committed cursor.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("stream disconnected: {0}")]
    Disconnected(String),

    #[error("chain reorganization signaled at block {block_number}")]
    Reorg { block_number: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Default)]
pub struct StreamStatus {
    pub head_block: Option<u64>,
}

pub type EventStream = BoxStream<'static, Result<StreamMessage, StreamError>>;

/// Source of ordered chain data. The dispatcher opens one subscription at a
/// time and reopens it from the committed cursor after any fault.
#[async_trait]
pub trait ChainStream: Send + Sync {
    /// Open a subscription starting just after `starting` (or at the chain's
    /// beginning when `None`).
    async fn subscribe(
        &self,
        filter: SubscriptionFilter,
        starting: Option<Cursor>,
        finality: Finality,
    ) -> Result<EventStream, StreamError>;

    /// Upstream liveness probe.
    async fn status(&self) -> Result<StreamStatus, StreamError>;
}
