//! Record writers for DAO events.
//!
//! `DaoCreatedWriter` is the factory hook: after persisting a new DAO it
//! extends the live subscription filter with the child contract address, so
//! the dispatcher starts streaming that DAO's proposal events without a
//! process restart.

use std::sync::Arc;

use async_trait::async_trait;
use ember::{
    DecodedRecord, RecordTypeId, RecordWriter, SharedFilter, StoreInsert, WriteOutcome,
};
use starknet::core::types::Felt;

use crate::records::{
    DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote,
};
use crate::store::DaoStore;

pub struct DaoCreatedWriter {
    store: Arc<dyn DaoStore>,
    filter: Option<SharedFilter>,
    type_id: RecordTypeId,
}

impl DaoCreatedWriter {
    pub fn new(store: Arc<dyn DaoStore>) -> Self {
        Self {
            store,
            filter: None,
            type_id: RecordTypeId::new(DaoCreated::TYPE),
        }
    }

    /// Extend this filter with every newly discovered DAO address.
    pub fn with_filter(mut self, filter: SharedFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
impl RecordWriter for DaoCreatedWriter {
    fn name(&self) -> &str {
        "dao.dao_created"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(dao) = record.downcast_ref::<DaoCreated>() else {
            return WriteOutcome::Failed("record is not a DaoCreated".into());
        };

        let outcome = match self.store.insert_dao(&record.context, dao).await {
            Ok(StoreInsert::Created) => WriteOutcome::Written,
            Ok(StoreInsert::Duplicate) => WriteOutcome::Skipped,
            Err(e) => return WriteOutcome::Failed(e.to_string()),
        };

        // Extend the filter even for duplicates: after a restart the rows
        // exist but the fresh filter does not yet carry the child address.
        if let Some(filter) = &self.filter {
            match Felt::from_hex(&dao.dao) {
                Ok(address) => {
                    if filter.add_contract(address) {
                        tracing::info!(
                            target: "ember_dao::writer",
                            dao = %dao.dao,
                            "discovered DAO, extending live filter"
                        );
                    }
                }
                Err(e) => tracing::warn!(
                    target: "ember_dao::writer",
                    dao = %dao.dao,
                    error = %e,
                    "discovered DAO has unparseable address"
                ),
            }
        }

        outcome
    }
}

pub struct ProposalCreatedWriter {
    store: Arc<dyn DaoStore>,
    type_id: RecordTypeId,
}

impl ProposalCreatedWriter {
    pub fn new(store: Arc<dyn DaoStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(ProposalCreated::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for ProposalCreatedWriter {
    fn name(&self) -> &str {
        "dao.proposal_created"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(proposal) = record.downcast_ref::<ProposalCreated>() else {
            return WriteOutcome::Failed("record is not a ProposalCreated".into());
        };
        match self.store.insert_proposal(&record.context, proposal).await {
            Ok(StoreInsert::Created) => WriteOutcome::Written,
            Ok(StoreInsert::Duplicate) => WriteOutcome::Skipped,
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }
}

pub struct ProposalVoteWriter {
    store: Arc<dyn DaoStore>,
    type_id: RecordTypeId,
}

impl ProposalVoteWriter {
    pub fn new(store: Arc<dyn DaoStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(ProposalVote::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for ProposalVoteWriter {
    fn name(&self) -> &str {
        "dao.proposal_vote"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(vote) = record.downcast_ref::<ProposalVote>() else {
            return WriteOutcome::Failed("record is not a ProposalVote".into());
        };
        match self.store.record_vote(&record.context, vote).await {
            Ok(StoreInsert::Created) => WriteOutcome::Written,
            Ok(StoreInsert::Duplicate) => {
                tracing::debug!(
                    target: "ember_dao::writer",
                    transfer_id = %record.transfer_id(),
                    "duplicate vote event, skipping"
                );
                WriteOutcome::Skipped
            }
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }
}

pub struct ProposalCanceledWriter {
    store: Arc<dyn DaoStore>,
    type_id: RecordTypeId,
}

impl ProposalCanceledWriter {
    pub fn new(store: Arc<dyn DaoStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(ProposalCanceled::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for ProposalCanceledWriter {
    fn name(&self) -> &str {
        "dao.proposal_canceled"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(canceled) = record.downcast_ref::<ProposalCanceled>() else {
            return WriteOutcome::Failed("record is not a ProposalCanceled".into());
        };
        match self.store.cancel_proposal(&record.context, canceled).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }
}

pub struct ProposalResolvedWriter {
    store: Arc<dyn DaoStore>,
    type_id: RecordTypeId,
}

impl ProposalResolvedWriter {
    pub fn new(store: Arc<dyn DaoStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(ProposalResolved::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for ProposalResolvedWriter {
    fn name(&self) -> &str {
        "dao.proposal_resolved"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(resolved) = record.downcast_ref::<ProposalResolved>() else {
            return WriteOutcome::Failed("record is not a ProposalResolved".into());
        };
        match self.store.resolve_proposal(&record.context, resolved).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember::{
        BlockHeader, EventContext, FilterBuilder, Network, RawEvent, StoreError, TransferId,
    };
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        seen: Mutex<HashSet<TransferId>>,
    }

    impl StubStore {
        fn insert(&self, ctx: &EventContext) -> Result<StoreInsert, StoreError> {
            if self.seen.lock().unwrap().insert(ctx.transfer_id()) {
                Ok(StoreInsert::Created)
            } else {
                Ok(StoreInsert::Duplicate)
            }
        }
    }

    #[async_trait]
    impl DaoStore for StubStore {
        async fn insert_dao(
            &self,
            ctx: &EventContext,
            _record: &DaoCreated,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn insert_proposal(
            &self,
            ctx: &EventContext,
            _record: &ProposalCreated,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn record_vote(
            &self,
            ctx: &EventContext,
            _record: &ProposalVote,
        ) -> Result<StoreInsert, StoreError> {
            self.insert(ctx)
        }

        async fn cancel_proposal(
            &self,
            _ctx: &EventContext,
            _record: &ProposalCanceled,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn resolve_proposal(
            &self,
            _ctx: &EventContext,
            _record: &ProposalResolved,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn dao_record() -> DecodedRecord {
        let header = BlockHeader {
            number: 1,
            hash: Felt::from(0x1u64),
            timestamp: 0,
        };
        let event = RawEvent {
            from_address: Felt::from(0xfac7u64),
            keys: vec![Felt::from(0x9u64)],
            data: vec![],
            transaction_hash: Felt::from(0x77u64),
            event_index: 0,
        };
        DecodedRecord {
            context: EventContext::new(Network::StarknetSepolia, &header, &event),
            body: Box::new(DaoCreated {
                dao: "0xd0a".into(),
                creator: "0x1".into(),
                token_contract: "0x2".into(),
                starknet_address: "0x3".into(),
            }),
        }
    }

    #[tokio::test]
    async fn dao_creation_extends_live_filter() {
        let filter = SharedFilter::new(FilterBuilder::new().build());
        let store = Arc::new(StubStore::default());
        let writer = DaoCreatedWriter::new(store).with_filter(filter.clone());

        assert_eq!(writer.write(&dao_record()).await, WriteOutcome::Written);
        assert_eq!(filter.generation(), 1);
        assert!(filter
            .snapshot()
            .contracts
            .contains(&Felt::from_hex("0xd0a").unwrap()));

        // Redelivery: row skipped, filter unchanged.
        assert_eq!(writer.write(&dao_record()).await, WriteOutcome::Skipped);
        assert_eq!(filter.generation(), 1);
    }
}
