//! Launchpad event family: token deploys, launches, trades, liquidity, and
//! claim shares.

pub mod records;
pub mod schemas;
pub mod store;
pub mod writers;

use std::sync::Arc;

use anyhow::Result;
use ember::EventSchemaRegistry;

pub use records::{
    LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade, TradeSide,
};
pub use store::LaunchpadStore;
pub use writers::{
    LiquidityAddedWriter, TokenClaimWriter, TokenDeployWriter, TokenLaunchWriter,
    TokenTradeWriter,
};

/// Register every launchpad event schema with its writer.
pub fn register(registry: &mut EventSchemaRegistry, store: Arc<dyn LaunchpadStore>) -> Result<()> {
    registry.register(
        schemas::create_token_schema()?,
        Arc::new(TokenDeployWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::create_launch_schema()?,
        Arc::new(TokenLaunchWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::buy_token_schema()?,
        Arc::new(TokenTradeWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::sell_token_schema()?,
        Arc::new(TokenTradeWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::liquidity_created_schema()?,
        Arc::new(LiquidityAddedWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::token_claimed_schema()?,
        Arc::new(TokenClaimWriter::new(store)),
    )?;
    Ok(())
}
