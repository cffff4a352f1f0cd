//! External persistence seam for DAO records.

use async_trait::async_trait;
use ember::{EventContext, StoreError, StoreInsert};

use crate::records::{
    DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote,
};

/// Relational store for DAO rows. Inserts are find-or-create keyed by the
/// dedup key; cancellation and resolution are idempotent state transitions
/// on an existing proposal row.
#[async_trait]
pub trait DaoStore: Send + Sync {
    async fn insert_dao(
        &self,
        ctx: &EventContext,
        record: &DaoCreated,
    ) -> Result<StoreInsert, StoreError>;

    async fn insert_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCreated,
    ) -> Result<StoreInsert, StoreError>;

    /// Upserts the (dao, proposal, voter) vote row; `Duplicate` only when
    /// this exact event was already applied.
    async fn record_vote(
        &self,
        ctx: &EventContext,
        record: &ProposalVote,
    ) -> Result<StoreInsert, StoreError>;

    async fn cancel_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCanceled,
    ) -> Result<(), StoreError>;

    async fn resolve_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalResolved,
    ) -> Result<(), StoreError>;
}
