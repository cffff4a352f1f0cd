//! Test utilities: a scripted chain stream, in-memory record stores, and
//! raw-event builders.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ember::{
    Block, BlockBatch, BlockHeader, ChainStream, Cursor, EventContext, EventStream, Finality,
    RawEvent, StoreError, StoreInsert, StreamError, StreamMessage, StreamStatus,
    SubscriptionFilter, SystemMessage, SystemMessageLevel, TransferId,
};
use ember_dao::records::{
    DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote,
};
use ember_dao::DaoStore;
use ember_launchpad::records::{
    LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade,
};
use ember_launchpad::LaunchpadStore;
use ember_nameservice::{NameClaim, NameserviceStore};
use futures::stream;
use futures::StreamExt;
use starknet::core::types::Felt;
use starknet::core::utils::cairo_short_string_to_felt;
use tokio_util::sync::CancellationToken;

/// One scripted subscription: the messages its stream yields before ending.
pub type Script = Vec<Result<StreamMessage, StreamError>>;

/// Chain stream that replays scripted subscriptions in order.
///
/// Each `subscribe` call consumes the next script; the returned stream yields
/// its messages and then ends (the dispatcher treats that as a transient
/// fault and resubscribes). Once all scripts are consumed the shutdown token
/// is cancelled and a pending stream is returned, so a dispatcher under test
/// stops deterministically.
pub struct ScriptedStream {
    scripts: Mutex<VecDeque<Script>>,
    subscriptions: Mutex<Vec<(SubscriptionFilter, Option<Cursor>)>>,
    on_exhausted: Option<CancellationToken>,
}

impl ScriptedStream {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            subscriptions: Mutex::new(Vec::new()),
            on_exhausted: None,
        }
    }

    /// Cancel `token` when a subscription is requested after the last script.
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.on_exhausted = Some(token);
        self
    }

    /// Filters and cursors of every `subscribe` call, in order.
    pub fn subscriptions(&self) -> Vec<(SubscriptionFilter, Option<Cursor>)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainStream for ScriptedStream {
    async fn subscribe(
        &self,
        filter: SubscriptionFilter,
        starting: Option<Cursor>,
        _finality: Finality,
    ) -> Result<EventStream, StreamError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((filter, starting));

        match self.scripts.lock().unwrap().pop_front() {
            Some(script) => Ok(stream::iter(script).boxed()),
            None => {
                if let Some(token) = &self.on_exhausted {
                    token.cancel();
                }
                Ok(stream::pending().boxed())
            }
        }
    }

    async fn status(&self) -> Result<StreamStatus, StreamError> {
        Ok(StreamStatus::default())
    }
}

/// In-memory launchpad store with dedup over the transfer id and one-shot
/// failure injection.
#[derive(Default)]
pub struct MemoryLaunchpadStore {
    seen: Mutex<HashSet<TransferId>>,
    pub deploys: Mutex<Vec<(EventContext, TokenDeploy)>>,
    pub launches: Mutex<Vec<(EventContext, TokenLaunch)>>,
    pub trades: Mutex<Vec<(EventContext, TokenTrade)>>,
    pub liquidity: Mutex<Vec<(EventContext, LiquidityAdded)>>,
    pub claims: Mutex<Vec<(EventContext, TokenClaim)>>,
    fail_next: AtomicBool,
}

impl MemoryLaunchpadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next insert fails with `StoreError::Unavailable`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check(&self, ctx: &EventContext) -> Result<bool, StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(self.seen.lock().unwrap().insert(ctx.transfer_id()))
    }
}

#[async_trait]
impl LaunchpadStore for MemoryLaunchpadStore {
    async fn insert_deploy(
        &self,
        ctx: &EventContext,
        record: &TokenDeploy,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx)? {
            return Ok(StoreInsert::Duplicate);
        }
        self.deploys.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn insert_launch(
        &self,
        ctx: &EventContext,
        record: &TokenLaunch,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx)? {
            return Ok(StoreInsert::Duplicate);
        }
        self.launches.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn insert_trade(
        &self,
        ctx: &EventContext,
        record: &TokenTrade,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx)? {
            return Ok(StoreInsert::Duplicate);
        }
        self.trades.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn insert_liquidity(
        &self,
        ctx: &EventContext,
        record: &LiquidityAdded,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx)? {
            return Ok(StoreInsert::Duplicate);
        }
        self.liquidity.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &TokenClaim,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx)? {
            return Ok(StoreInsert::Duplicate);
        }
        self.claims.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }
}

/// In-memory nameservice store.
#[derive(Default)]
pub struct MemoryNameserviceStore {
    seen: Mutex<HashSet<TransferId>>,
    pub claims: Mutex<Vec<(EventContext, NameClaim)>>,
}

impl MemoryNameserviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NameserviceStore for MemoryNameserviceStore {
    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &NameClaim,
    ) -> Result<StoreInsert, StoreError> {
        if !self.seen.lock().unwrap().insert(ctx.transfer_id()) {
            return Ok(StoreInsert::Duplicate);
        }
        self.claims.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }
}

/// In-memory DAO store.
#[derive(Default)]
pub struct MemoryDaoStore {
    seen: Mutex<HashSet<TransferId>>,
    pub daos: Mutex<Vec<(EventContext, DaoCreated)>>,
    pub proposals: Mutex<Vec<(EventContext, ProposalCreated)>>,
    pub votes: Mutex<Vec<(EventContext, ProposalVote)>>,
    pub cancellations: Mutex<Vec<(EventContext, ProposalCanceled)>>,
    pub resolutions: Mutex<Vec<(EventContext, ProposalResolved)>>,
}

impl MemoryDaoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, ctx: &EventContext) -> bool {
        self.seen.lock().unwrap().insert(ctx.transfer_id())
    }
}

#[async_trait]
impl DaoStore for MemoryDaoStore {
    async fn insert_dao(
        &self,
        ctx: &EventContext,
        record: &DaoCreated,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx) {
            return Ok(StoreInsert::Duplicate);
        }
        self.daos.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn insert_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCreated,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx) {
            return Ok(StoreInsert::Duplicate);
        }
        self.proposals.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn record_vote(
        &self,
        ctx: &EventContext,
        record: &ProposalVote,
    ) -> Result<StoreInsert, StoreError> {
        if !self.check(ctx) {
            return Ok(StoreInsert::Duplicate);
        }
        self.votes.lock().unwrap().push((ctx.clone(), record.clone()));
        Ok(StoreInsert::Created)
    }

    async fn cancel_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCanceled,
    ) -> Result<(), StoreError> {
        self.cancellations
            .lock()
            .unwrap()
            .push((ctx.clone(), record.clone()));
        Ok(())
    }

    async fn resolve_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalResolved,
    ) -> Result<(), StoreError> {
        self.resolutions
            .lock()
            .unwrap()
            .push((ctx.clone(), record.clone()));
        Ok(())
    }
}

// ===== Raw-event builders =====

/// Packed ASCII short string as a felt. Panics on invalid input; test-only.
pub fn short_string(s: &str) -> Felt {
    cairo_short_string_to_felt(s).expect("valid short string")
}

/// A u256 value as its [low, high] felt pair.
pub fn u256_parts(value: u128) -> [Felt; 2] {
    [Felt::from(value), Felt::ZERO]
}

pub fn header(number: u64, timestamp: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: Felt::from(number) + Felt::from(0xb10c_0000u64),
        timestamp,
    }
}

pub fn event(
    from_address: Felt,
    keys: Vec<Felt>,
    data: Vec<Felt>,
    transaction_hash: Felt,
    event_index: u64,
) -> RawEvent {
    RawEvent {
        from_address,
        keys,
        data,
        transaction_hash,
        event_index,
    }
}

pub fn block(header: BlockHeader, events: Vec<RawEvent>) -> Block {
    Block { header, events }
}

pub fn data_msg(blocks: Vec<Block>) -> Result<StreamMessage, StreamError> {
    Ok(StreamMessage::Data(BlockBatch { blocks }))
}

pub fn system_msg(text: &str) -> Result<StreamMessage, StreamError> {
    Ok(StreamMessage::System(SystemMessage {
        level: SystemMessageLevel::Info,
        text: text.to_string(),
    }))
}
