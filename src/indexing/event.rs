//! Raw chain data and per-event context shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use super::codec;

/// Chain network an indexer runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    StarknetMainnet,
    StarknetSepolia,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StarknetMainnet => "starknet-mainnet",
            Self::StarknetSepolia => "starknet-sepolia",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starknet-mainnet" | "mainnet" => Ok(Self::StarknetMainnet),
            "starknet-sepolia" | "sepolia" => Ok(Self::StarknetSepolia),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Header of the block that owns an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: Felt,
    /// UNIX seconds.
    pub timestamp: u64,
}

/// Event exactly as delivered by the chain stream: selector plus indexed
/// arguments in `keys`, non-indexed arguments in `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub from_address: Felt,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
    pub transaction_hash: Felt,
    /// Position of the event within its block, fixed by the chain.
    pub event_index: u64,
}

impl RawEvent {
    /// The wire-level event identifier, `keys[0]`.
    pub fn selector(&self) -> Option<Felt> {
        self.keys.first().copied()
    }
}

/// A block together with its events, in original emission order.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub events: Vec<RawEvent>,
}

/// A batch of blocks in increasing height order, as delivered by one stream
/// message.
#[derive(Debug, Clone)]
pub struct BlockBatch {
    pub blocks: Vec<Block>,
}

/// Dedup key: at most one persisted row ever exists for a given `TransferId`,
/// regardless of how many times the stream redelivers the event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId {
    pub transaction_hash: String,
    pub event_index: u64,
}

impl TransferId {
    pub fn new(transaction_hash: Felt, event_index: u64) -> Self {
        Self {
            transaction_hash: codec::canonical_hex(&transaction_hash),
            event_index,
        }
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.transaction_hash, self.event_index)
    }
}

/// On-chain context attached to every decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventContext {
    pub network: Network,
    pub block_number: u64,
    pub block_hash: String,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub event_index: u64,
    pub contract: String,
}

impl EventContext {
    pub fn new(network: Network, header: &BlockHeader, event: &RawEvent) -> Self {
        Self {
            network,
            block_number: header.number,
            block_hash: codec::canonical_hex(&header.hash),
            block_timestamp: DateTime::<Utc>::from_timestamp(header.timestamp as i64, 0)
                .unwrap_or_default(),
            transaction_hash: codec::canonical_hex(&event.transaction_hash),
            event_index: event.event_index,
            contract: codec::canonical_hex(&event.from_address),
        }
    }

    pub fn transfer_id(&self) -> TransferId {
        TransferId {
            transaction_hash: self.transaction_hash.clone(),
            event_index: self.event_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_id_display_matches_store_key_format() {
        let id = TransferId::new(Felt::from(0xabcdu64), 3);
        assert!(id.transaction_hash.starts_with("0x"));
        assert_eq!(id.transaction_hash.len(), 66);
        assert_eq!(format!("{id}"), format!("{}_3", id.transaction_hash));
    }

    #[test]
    fn context_carries_block_and_transaction_identity() {
        let header = BlockHeader {
            number: 100,
            hash: Felt::from(0x1u64),
            timestamp: 1_700_000_000,
        };
        let event = RawEvent {
            from_address: Felt::from(0x2u64),
            keys: vec![Felt::from(0x3u64)],
            data: vec![],
            transaction_hash: Felt::from(0x4u64),
            event_index: 7,
        };

        let ctx = EventContext::new(Network::StarknetSepolia, &header, &event);
        assert_eq!(ctx.block_number, 100);
        assert_eq!(ctx.event_index, 7);
        assert_eq!(ctx.transfer_id(), TransferId::new(Felt::from(0x4u64), 7));
        assert_eq!(ctx.block_timestamp.timestamp(), 1_700_000_000);
    }
}
