//! Structured-log record store.
//!
//! Implements every domain store trait by emitting each row as a structured
//! log line, with in-memory dedup over the transfer id. The relational store
//! is an external collaborator; this stand-in keeps the binaries runnable
//! and makes every indexed row operator-visible.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use ember::{EventContext, StoreError, StoreInsert, TransferId};
use ember_dao::records::{
    DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote,
};
use ember_dao::DaoStore;
use ember_launchpad::records::{
    LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade,
};
use ember_launchpad::LaunchpadStore;
use ember_nameservice::{NameClaim, NameserviceStore};
use serde::Serialize;

#[derive(Default)]
pub struct LogRecordStore {
    seen: Mutex<HashSet<TransferId>>,
}

impl LogRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_once<T: Serialize>(
        &self,
        ctx: &EventContext,
        kind: &str,
        record: &T,
    ) -> Result<StoreInsert, StoreError> {
        let transfer_id = ctx.transfer_id();
        let is_new = self
            .seen
            .lock()
            .map_err(|_| StoreError::Unavailable("dedup set poisoned".into()))?
            .insert(transfer_id.clone());

        if !is_new {
            return Ok(StoreInsert::Duplicate);
        }

        let row = serde_json::to_string(record).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        tracing::info!(
            target: "ember_log_store",
            kind,
            transfer_id = %transfer_id,
            block_number = ctx.block_number,
            tx_hash = %ctx.transaction_hash,
            row = %row,
            "record"
        );
        Ok(StoreInsert::Created)
    }

    fn log_transition<T: Serialize>(&self, ctx: &EventContext, kind: &str, record: &T) {
        let row = serde_json::to_string(record).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        tracing::info!(
            target: "ember_log_store",
            kind,
            block_number = ctx.block_number,
            tx_hash = %ctx.transaction_hash,
            row = %row,
            "state transition"
        );
    }
}

#[async_trait]
impl LaunchpadStore for LogRecordStore {
    async fn insert_deploy(
        &self,
        ctx: &EventContext,
        record: &TokenDeploy,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "token_deploy", record)
    }

    async fn insert_launch(
        &self,
        ctx: &EventContext,
        record: &TokenLaunch,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "token_launch", record)
    }

    async fn insert_trade(
        &self,
        ctx: &EventContext,
        record: &TokenTrade,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "token_trade", record)
    }

    async fn insert_liquidity(
        &self,
        ctx: &EventContext,
        record: &LiquidityAdded,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "liquidity_added", record)
    }

    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &TokenClaim,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "token_claim", record)
    }
}

#[async_trait]
impl NameserviceStore for LogRecordStore {
    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &NameClaim,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "name_claim", record)
    }
}

#[async_trait]
impl DaoStore for LogRecordStore {
    async fn insert_dao(
        &self,
        ctx: &EventContext,
        record: &DaoCreated,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "dao_created", record)
    }

    async fn insert_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCreated,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "proposal_created", record)
    }

    async fn record_vote(
        &self,
        ctx: &EventContext,
        record: &ProposalVote,
    ) -> Result<StoreInsert, StoreError> {
        self.insert_once(ctx, "proposal_vote", record)
    }

    async fn cancel_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalCanceled,
    ) -> Result<(), StoreError> {
        self.log_transition(ctx, "proposal_canceled", record);
        Ok(())
    }

    async fn resolve_proposal(
        &self,
        ctx: &EventContext,
        record: &ProposalResolved,
    ) -> Result<(), StoreError> {
        self.log_transition(ctx, "proposal_resolved", record);
        Ok(())
    }
}
