//! Event schemas for the launchpad contract.
//!
//! Layouts mirror the on-chain event definitions: indexed arguments after
//! the selector in `keys`, the rest in `data`, u256 values as adjacent
//! low/high pairs. The trade events exist in two contract versions; the
//! upgraded payload appends a `coin_amount` pair and is a separate variant.

use anyhow::Result;
use ember::codec::{field, CodecError, DecodedFields, FieldKind, FieldLayout};
use ember::{EventContext, EventSchema, Record, SchemaVariant};

use crate::records::{
    LiquidityAdded, TokenClaim, TokenDeploy, TokenLaunch, TokenTrade, TradeSide,
};

const CREATE_TOKEN: FieldLayout = FieldLayout {
    keys: &[
        field("caller", FieldKind::Address),
        field("token", FieldKind::Address),
    ],
    data: &[
        field("symbol", FieldKind::ShortString),
        field("name", FieldKind::ShortString),
        field("initial_supply", FieldKind::Amount),
        field("total_supply", FieldKind::Amount),
    ],
};

const CREATE_LAUNCH: FieldLayout = FieldLayout {
    keys: &[
        field("caller", FieldKind::Address),
        field("token", FieldKind::Address),
        field("quote_token", FieldKind::Address),
    ],
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("total_supply", FieldKind::Amount),
        field("slope", FieldKind::Amount),
        field("threshold_liquidity", FieldKind::Amount),
        field("bonding_type", FieldKind::ShortString),
    ],
};

const BUY_TOKEN_V1: FieldLayout = FieldLayout {
    keys: &[
        field("caller", FieldKind::Address),
        field("token", FieldKind::Address),
    ],
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("protocol_fee", FieldKind::Amount),
        field("last_price", FieldKind::Amount),
        field("timestamp", FieldKind::Timestamp),
        field("quote_amount", FieldKind::Amount),
    ],
};

const BUY_TOKEN_V2: FieldLayout = FieldLayout {
    keys: BUY_TOKEN_V1.keys,
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("protocol_fee", FieldKind::Amount),
        field("last_price", FieldKind::Amount),
        field("timestamp", FieldKind::Timestamp),
        field("quote_amount", FieldKind::Amount),
        field("coin_amount", FieldKind::Amount),
    ],
};

const SELL_TOKEN_V1: FieldLayout = FieldLayout {
    keys: &[
        field("caller", FieldKind::Address),
        field("token", FieldKind::Address),
    ],
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("protocol_fee", FieldKind::Amount),
        field("creator_fee", FieldKind::Amount),
        field("timestamp", FieldKind::Timestamp),
        field("last_price", FieldKind::Amount),
    ],
};

const SELL_TOKEN_V2: FieldLayout = FieldLayout {
    keys: SELL_TOKEN_V1.keys,
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("protocol_fee", FieldKind::Amount),
        field("creator_fee", FieldKind::Amount),
        field("timestamp", FieldKind::Timestamp),
        field("last_price", FieldKind::Amount),
        field("coin_amount", FieldKind::Amount),
    ],
};

const LIQUIDITY_CREATED: FieldLayout = FieldLayout {
    keys: &[
        field("id", FieldKind::Uint256),
        field("pool", FieldKind::Address),
        field("asset", FieldKind::Address),
        field("token", FieldKind::Address),
    ],
    data: &[field("owner", FieldKind::Address)],
};

const TOKEN_CLAIMED: FieldLayout = FieldLayout {
    keys: &[
        field("caller", FieldKind::Address),
        field("token", FieldKind::Address),
    ],
    data: &[
        field("amount", FieldKind::Amount),
        field("price", FieldKind::Amount),
        field("protocol_fee", FieldKind::Amount),
        field("last_price", FieldKind::Amount),
        field("timestamp", FieldKind::Timestamp),
        field("quote_amount", FieldKind::Amount),
    ],
};

fn build_token_deploy(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(TokenDeploy {
        owner: fields.require_address("caller")?,
        token: fields.require_address("token")?,
        symbol: fields.require_short_string("symbol")?,
        name: fields.require_short_string("name")?,
        initial_supply: fields.require_amount("initial_supply")?,
        total_supply: fields.require_amount("total_supply")?,
    }))
}

fn build_token_launch(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(TokenLaunch {
        owner: fields.require_address("caller")?,
        token: fields.require_address("token")?,
        quote_token: fields.require_address("quote_token")?,
        amount: fields.require_amount("amount")?,
        price: fields.require_amount("price")?,
        total_supply: fields.require_amount("total_supply")?,
        slope: fields.require_amount("slope")?,
        threshold_liquidity: fields.require_amount("threshold_liquidity")?,
        bonding_type: fields.require_short_string("bonding_type")?,
    }))
}

fn build_trade(
    fields: &DecodedFields,
    side: TradeSide,
    with_coin_amount: bool,
) -> Result<Box<dyn Record>, CodecError> {
    let creator_fee = match side {
        TradeSide::Sell => Some(fields.require_amount("creator_fee")?),
        TradeSide::Buy => None,
    };
    let quote_amount = match side {
        TradeSide::Buy => Some(fields.require_amount("quote_amount")?),
        TradeSide::Sell => None,
    };
    let coin_amount = if with_coin_amount {
        Some(fields.require_amount("coin_amount")?)
    } else {
        None
    };

    Ok(Box::new(TokenTrade {
        owner: fields.require_address("caller")?,
        token: fields.require_address("token")?,
        side,
        amount: fields.require_amount("amount")?,
        price: fields.require_amount("price")?,
        protocol_fee: fields.require_amount("protocol_fee")?,
        last_price: fields.require_amount("last_price")?,
        creator_fee,
        quote_amount,
        coin_amount,
        timestamp: fields.require_timestamp("timestamp")?,
    }))
}

fn build_buy_v1(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    build_trade(fields, TradeSide::Buy, false)
}

fn build_buy_v2(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    build_trade(fields, TradeSide::Buy, true)
}

fn build_sell_v1(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    build_trade(fields, TradeSide::Sell, false)
}

fn build_sell_v2(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    build_trade(fields, TradeSide::Sell, true)
}

fn build_liquidity_added(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(LiquidityAdded {
        id: fields.require_uint256("id")?.to_string(),
        pool: fields.require_address("pool")?,
        asset: fields.require_address("asset")?,
        token: fields.require_address("token")?,
        owner: fields.require_address("owner")?,
    }))
}

fn build_token_claim(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(TokenClaim {
        owner: fields.require_address("caller")?,
        token: fields.require_address("token")?,
        amount: fields.require_amount("amount")?,
        price: fields.require_amount("price")?,
        protocol_fee: fields.require_amount("protocol_fee")?,
        last_price: fields.require_amount("last_price")?,
        quote_amount: fields.require_amount("quote_amount")?,
        timestamp: fields.require_timestamp("timestamp")?,
    }))
}

pub fn create_token_schema() -> Result<EventSchema> {
    EventSchema::new(
        "CreateToken",
        vec![SchemaVariant {
            version: 1,
            layout: CREATE_TOKEN,
            build: build_token_deploy,
        }],
    )
}

pub fn create_launch_schema() -> Result<EventSchema> {
    EventSchema::new(
        "CreateLaunch",
        vec![SchemaVariant {
            version: 1,
            layout: CREATE_LAUNCH,
            build: build_token_launch,
        }],
    )
}

pub fn buy_token_schema() -> Result<EventSchema> {
    EventSchema::new(
        "BuyToken",
        vec![
            SchemaVariant {
                version: 2,
                layout: BUY_TOKEN_V2,
                build: build_buy_v2,
            },
            SchemaVariant {
                version: 1,
                layout: BUY_TOKEN_V1,
                build: build_buy_v1,
            },
        ],
    )
}

pub fn sell_token_schema() -> Result<EventSchema> {
    EventSchema::new(
        "SellToken",
        vec![
            SchemaVariant {
                version: 2,
                layout: SELL_TOKEN_V2,
                build: build_sell_v2,
            },
            SchemaVariant {
                version: 1,
                layout: SELL_TOKEN_V1,
                build: build_sell_v1,
            },
        ],
    )
}

pub fn liquidity_created_schema() -> Result<EventSchema> {
    EventSchema::new(
        "LiquidityCreated",
        vec![SchemaVariant {
            version: 1,
            layout: LIQUIDITY_CREATED,
            build: build_liquidity_added,
        }],
    )
}

pub fn token_claimed_schema() -> Result<EventSchema> {
    EventSchema::new(
        "TokenClaimed",
        vec![SchemaVariant {
            version: 1,
            layout: TOKEN_CLAIMED,
            build: build_token_claim,
        }],
    )
}
