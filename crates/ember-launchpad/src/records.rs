//! Typed records for launchpad events.
//!
//! All amounts are fixed-point decimal strings produced by the codec's
//! single scaling path; all addresses are canonical hex.

use std::any::Any;

use chrono::{DateTime, Utc};
use ember::{Record, RecordTypeId};
use serde::Serialize;

/// `CreateToken`: a new memecoin contract deployed through the launchpad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDeploy {
    pub owner: String,
    pub token: String,
    pub symbol: String,
    pub name: String,
    pub initial_supply: String,
    pub total_supply: String,
}

impl TokenDeploy {
    pub const TYPE: &'static str = "launchpad.token_deploy";
}

impl Record for TokenDeploy {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `CreateLaunch`: a token put on its bonding curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenLaunch {
    pub owner: String,
    pub token: String,
    pub quote_token: String,
    pub amount: String,
    pub price: String,
    pub total_supply: String,
    pub slope: String,
    pub threshold_liquidity: String,
    pub bonding_type: String,
}

impl TokenLaunch {
    pub const TYPE: &'static str = "launchpad.token_launch";
}

impl Record for TokenLaunch {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        })
    }
}

/// `BuyToken` / `SellToken`: one trade against the bonding curve.
///
/// `creator_fee` only exists on sells, `quote_amount` only on buys, and
/// `coin_amount` only in the upgraded contract's payload (an explicit schema
/// variant, never inferred from leftover felts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTrade {
    pub owner: String,
    pub token: String,
    pub side: TradeSide,
    pub amount: String,
    pub price: String,
    pub protocol_fee: String,
    pub last_price: String,
    pub creator_fee: Option<String>,
    pub quote_amount: Option<String>,
    pub coin_amount: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TokenTrade {
    pub const TYPE: &'static str = "launchpad.token_trade";
}

impl Record for TokenTrade {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `LiquidityCreated`: graduated liquidity added to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityAdded {
    /// Position id, raw integer.
    pub id: String,
    pub pool: String,
    pub asset: String,
    pub token: String,
    pub owner: String,
}

impl LiquidityAdded {
    pub const TYPE: &'static str = "launchpad.liquidity_added";
}

impl Record for LiquidityAdded {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `TokenClaimed`: a user claiming their share after graduation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaim {
    pub owner: String,
    pub token: String,
    pub amount: String,
    pub price: String,
    pub protocol_fee: String,
    pub last_price: String,
    pub quote_amount: String,
    pub timestamp: DateTime<Utc>,
}

impl TokenClaim {
    pub const TYPE: &'static str = "launchpad.token_claim";
}

impl Record for TokenClaim {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
