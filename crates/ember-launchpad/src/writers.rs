//! Record writers for launchpad events: validate, dedupe, persist.

use std::sync::Arc;

use async_trait::async_trait;
use ember::{DecodedRecord, RecordTypeId, RecordWriter, StoreInsert, WriteOutcome};

use crate::records::{LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade};
use crate::store::LaunchpadStore;

fn outcome(result: Result<StoreInsert, ember::StoreError>, record: &DecodedRecord) -> WriteOutcome {
    match result {
        Ok(StoreInsert::Created) => WriteOutcome::Written,
        Ok(StoreInsert::Duplicate) => {
            tracing::debug!(
                target: "ember_launchpad::writer",
                transfer_id = %record.transfer_id(),
                "duplicate record, skipping"
            );
            WriteOutcome::Skipped
        }
        Err(e) => WriteOutcome::Failed(e.to_string()),
    }
}

pub struct TokenDeployWriter {
    store: Arc<dyn LaunchpadStore>,
    type_id: RecordTypeId,
}

impl TokenDeployWriter {
    pub fn new(store: Arc<dyn LaunchpadStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(TokenDeploy::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for TokenDeployWriter {
    fn name(&self) -> &str {
        "launchpad.token_deploy"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(deploy) = record.downcast_ref::<TokenDeploy>() else {
            return WriteOutcome::Failed("record is not a TokenDeploy".into());
        };
        outcome(
            self.store.insert_deploy(&record.context, deploy).await,
            record,
        )
    }
}

pub struct TokenLaunchWriter {
    store: Arc<dyn LaunchpadStore>,
    type_id: RecordTypeId,
}

impl TokenLaunchWriter {
    pub fn new(store: Arc<dyn LaunchpadStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(TokenLaunch::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for TokenLaunchWriter {
    fn name(&self) -> &str {
        "launchpad.token_launch"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(launch) = record.downcast_ref::<TokenLaunch>() else {
            return WriteOutcome::Failed("record is not a TokenLaunch".into());
        };
        outcome(
            self.store.insert_launch(&record.context, launch).await,
            record,
        )
    }
}

/// Handles both `BuyToken` and `SellToken`; the side lives in the record.
pub struct TokenTradeWriter {
    store: Arc<dyn LaunchpadStore>,
    type_id: RecordTypeId,
}

impl TokenTradeWriter {
    pub fn new(store: Arc<dyn LaunchpadStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(TokenTrade::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for TokenTradeWriter {
    fn name(&self) -> &str {
        "launchpad.token_trade"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(trade) = record.downcast_ref::<TokenTrade>() else {
            return WriteOutcome::Failed("record is not a TokenTrade".into());
        };
        outcome(
            self.store.insert_trade(&record.context, trade).await,
            record,
        )
    }
}

pub struct LiquidityAddedWriter {
    store: Arc<dyn LaunchpadStore>,
    type_id: RecordTypeId,
}

impl LiquidityAddedWriter {
    pub fn new(store: Arc<dyn LaunchpadStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(LiquidityAdded::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for LiquidityAddedWriter {
    fn name(&self) -> &str {
        "launchpad.liquidity_added"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(liquidity) = record.downcast_ref::<LiquidityAdded>() else {
            return WriteOutcome::Failed("record is not a LiquidityAdded".into());
        };
        outcome(
            self.store.insert_liquidity(&record.context, liquidity).await,
            record,
        )
    }
}

pub struct TokenClaimWriter {
    store: Arc<dyn LaunchpadStore>,
    type_id: RecordTypeId,
}

impl TokenClaimWriter {
    pub fn new(store: Arc<dyn LaunchpadStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(TokenClaim::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for TokenClaimWriter {
    fn name(&self) -> &str {
        "launchpad.token_claim"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(claim) = record.downcast_ref::<TokenClaim>() else {
            return WriteOutcome::Failed("record is not a TokenClaim".into());
        };
        outcome(
            self.store.insert_claim(&record.context, claim).await,
            record,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember::{BlockHeader, EventContext, Network, RawEvent, StoreError, TransferId};
    use starknet::core::types::Felt;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        seen: Mutex<HashSet<TransferId>>,
        fail: Mutex<bool>,
    }

    impl StubStore {
        fn insert(&self, ctx: &EventContext) -> Result<StoreInsert, StoreError> {
            if *self.fail.lock().unwrap() {
                return Err(StoreError::Unavailable("injected".into()));
            }
            if self.seen.lock().unwrap().insert(ctx.transfer_id()) {
                Ok(StoreInsert::Created)
            } else {
                Ok(StoreInsert::Duplicate)
            }
        }
    }

    #[async_trait]
    impl LaunchpadStore for StubStore {
        async fn insert_deploy(
            &self,
            ctx: &EventContext,
            _record: &TokenDeploy,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn insert_launch(
            &self,
            ctx: &EventContext,
            _record: &TokenLaunch,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn insert_trade(
            &self,
            ctx: &EventContext,
            _record: &TokenTrade,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn insert_liquidity(
            &self,
            ctx: &EventContext,
            _record: &LiquidityAdded,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn insert_claim(
            &self,
            ctx: &EventContext,
            _record: &TokenClaim,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }
    }

    fn launch_record() -> DecodedRecord {
        let header = BlockHeader {
            number: 10,
            hash: Felt::from(0x1u64),
            timestamp: 0,
        };
        let event = RawEvent {
            from_address: Felt::from(0x2u64),
            keys: vec![Felt::from(0x3u64)],
            data: vec![],
            transaction_hash: Felt::from(0x4u64),
            event_index: 1,
        };
        DecodedRecord {
            context: EventContext::new(Network::StarknetSepolia, &header, &event),
            body: Box::new(TokenLaunch {
                owner: "0x1".into(),
                token: "0x2".into(),
                quote_token: "0x3".into(),
                amount: "1.000000".into(),
                price: "0.500000".into(),
                total_supply: "100.000000".into(),
                slope: "0.000000".into(),
                threshold_liquidity: "0.000000".into(),
                bonding_type: "linear".into(),
            }),
        }
    }

    #[tokio::test]
    async fn writing_twice_yields_written_then_skipped() {
        let store = Arc::new(StubStore::default());
        let writer = TokenLaunchWriter::new(store);
        let record = launch_record();

        assert_eq!(writer.write(&record).await, WriteOutcome::Written);
        assert_eq!(writer.write(&record).await, WriteOutcome::Skipped);
    }

    #[tokio::test]
    async fn store_failure_becomes_failed_outcome() {
        let store = Arc::new(StubStore::default());
        *store.fail.lock().unwrap() = true;
        let writer = TokenLaunchWriter::new(store);

        assert!(matches!(
            writer.write(&launch_record()).await,
            WriteOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn writer_rejects_foreign_record_types() {
        let store = Arc::new(StubStore::default());
        let writer = TokenDeployWriter::new(store);
        let record = launch_record();

        assert!(!writer.accepts(record.record_type()));
        assert!(matches!(
            writer.write(&record).await,
            WriteOutcome::Failed(_)
        ));
    }
}
