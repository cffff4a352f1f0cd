pub mod codec;
pub mod cursor;
pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod retry;
pub mod rpc;
pub mod schema;
pub mod stream;
pub mod writer;

pub use cursor::{Cursor, CursorStore, CursorStoreConfig, Finality};
pub use dispatcher::{DispatchStats, DispatcherConfig, IndexerDispatcher};
pub use event::{Block, BlockBatch, BlockHeader, EventContext, Network, RawEvent, TransferId};
pub use filter::{FilterBuilder, SharedFilter, SubscriptionFilter};
pub use retry::{Backoff, RetryPolicy};
pub use rpc::{JsonRpcChainStream, JsonRpcStreamConfig};
pub use schema::{
    selector_of, DecodeError, DecodedRecord, EventSchema, EventSchemaRegistry, Record,
    RecordBuilder, RecordTypeId, RegisteredSchema, SchemaVariant,
};
pub use stream::{
    ChainStream, EventStream, StreamError, StreamMessage, StreamStatus, SystemMessage,
    SystemMessageLevel,
};
pub use writer::{RecordWriter, StoreError, StoreInsert, WriteOutcome};
