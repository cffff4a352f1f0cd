//! External persistence seam for launchpad records.

use async_trait::async_trait;
use ember::{EventContext, StoreError, StoreInsert};

use crate::records::{LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade};

/// Relational store for launchpad rows. Every insert is find-or-create keyed
/// by the context's dedup key: `Created` the first time, `Duplicate` on any
/// redelivery.
#[async_trait]
pub trait LaunchpadStore: Send + Sync {
    async fn insert_deploy(
        &self,
        ctx: &EventContext,
        record: &TokenDeploy,
    ) -> Result<StoreInsert, StoreError>;

    async fn insert_launch(
        &self,
        ctx: &EventContext,
        record: &TokenLaunch,
    ) -> Result<StoreInsert, StoreError>;

    async fn insert_trade(
        &self,
        ctx: &EventContext,
        record: &TokenTrade,
    ) -> Result<StoreInsert, StoreError>;

    async fn insert_liquidity(
        &self,
        ctx: &EventContext,
        record: &LiquidityAdded,
    ) -> Result<StoreInsert, StoreError>;

    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &TokenClaim,
    ) -> Result<StoreInsert, StoreError>;
}
