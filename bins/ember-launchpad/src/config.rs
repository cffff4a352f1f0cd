//! Configuration for the launchpad indexer.

use clap::Parser;
use ember::{Finality, Network};
use starknet::core::types::Felt;

/// Launchpad + nameservice indexer for Starknet.
///
/// Streams launch, trade, liquidity, and username events from the configured
/// contracts and persists normalized rows exactly once.
#[derive(Parser, Debug)]
#[command(name = "ember-launchpad")]
#[command(about = "Index launchpad and nameservice events on Starknet", long_about = None)]
pub struct Config {
    /// Starknet JSON-RPC endpoint backing the chain stream
    #[arg(
        long,
        env = "STREAM_URL",
        default_value = "https://api.cartridge.gg/x/starknet/sepolia"
    )]
    pub stream_url: String,

    /// First block to index when no cursor has been persisted
    #[arg(long, env = "STARTING_BLOCK", default_value = "0")]
    pub starting_block: u64,

    /// Contract addresses of interest (comma-separated hex)
    #[arg(long, env = "CONTRACT_ADDRESSES", value_delimiter = ',')]
    pub contract_addresses: Vec<String>,

    /// Fixed-point scale for amount decoding
    #[arg(long, env = "DECIMALS", default_value = "18")]
    pub decimals: u32,

    /// Cursor store: SQLite path or postgres:// URL
    #[arg(long, env = "DATABASE_URL", default_value = "./ember-data/cursor.db")]
    pub database_url: String,

    /// Chain network identifier
    #[arg(long, env = "NETWORK", default_value = "starknet-sepolia")]
    pub network: Network,

    /// Finality tier to stream at
    #[arg(long, env = "FINALITY", default_value = "accepted")]
    pub finality: Finality,

    /// Identity under which the cursor is persisted
    #[arg(long, default_value = "launchpad")]
    pub indexer_id: String,

    /// Stream read timeout in seconds
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value = "40")]
    pub read_timeout_secs: u64,
}

impl Config {
    /// Parse configured contract addresses.
    pub fn parse_contracts(&self) -> Result<Vec<Felt>, String> {
        self.contract_addresses
            .iter()
            .map(|s| {
                Felt::from_hex(s).map_err(|e| format!("invalid contract address '{s}': {e}"))
            })
            .collect()
    }
}
