//! Ember - Starknet event indexer for launchpad and DAO contracts.
//!
//! Long-running services subscribe to a chain-data stream, decode packed
//! felt payloads into typed domain records, deduplicate against a persisted
//! watermark, and write exactly-once application rows.
//!
//! Data flow: [`ChainStream`] → [`IndexerDispatcher`] →
//! [`EventSchemaRegistry`] (selector lookup) → [`indexing::codec`] (payload
//! decode) → [`RecordWriter`]s (validate + dedupe + persist) → [`CursorStore`]
//! commit.
//!
//! Domain record types, their schemas, and their writers live in the
//! per-family crates (`ember-launchpad`, `ember-nameservice`, `ember-dao`);
//! this crate is the pipeline itself.

pub mod indexing;

// Re-exports for schema/writer authors.
pub use async_trait::async_trait;
pub use starknet::core::types::Felt;

pub use indexing::codec;
pub use indexing::{
    selector_of, Backoff, Block, BlockBatch, BlockHeader, ChainStream, Cursor, CursorStore,
    CursorStoreConfig, DecodeError, DecodedRecord, DispatchStats, DispatcherConfig, EventContext,
    EventSchema, EventSchemaRegistry, EventStream, FilterBuilder, Finality, IndexerDispatcher,
    JsonRpcChainStream, JsonRpcStreamConfig, Network, RawEvent, Record, RecordTypeId,
    RecordWriter, RetryPolicy, SchemaVariant, SharedFilter, StoreError, StoreInsert, StreamError,
    StreamMessage, StreamStatus, SubscriptionFilter, SystemMessage, SystemMessageLevel,
    TransferId, WriteOutcome,
};
