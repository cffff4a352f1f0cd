//! Configuration for the DAO indexer.

use clap::Parser;
use ember::{Finality, Network};
use starknet::core::types::Felt;

/// DAO factory indexer for Starknet.
///
/// Streams factory deployments from the configured factory contract and
/// follows every deployed DAO's proposal and vote events.
#[derive(Parser, Debug)]
#[command(name = "ember-dao")]
#[command(about = "Index DAO factory, proposal, and vote events on Starknet", long_about = None)]
pub struct Config {
    /// Starknet JSON-RPC endpoint backing the chain stream
    #[arg(
        long,
        env = "STREAM_URL",
        default_value = "https://api.cartridge.gg/x/starknet/sepolia"
    )]
    pub stream_url: String,

    /// DAO factory contract address
    #[arg(long, env = "DAO_FACTORY_ADDRESS")]
    pub factory_address: String,

    /// First block to index when no cursor has been persisted
    #[arg(long, env = "STARTING_BLOCK", default_value = "0")]
    pub starting_block: u64,

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
    #[arg(long, default_value = "dao")]
    pub indexer_id: String,

    /// Stream read timeout in seconds
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value = "40")]
    pub read_timeout_secs: u64,
}

impl Config {
    pub fn parse_factory(&self) -> Result<Felt, String> {
        Felt::from_hex(&self.factory_address)
            .map_err(|e| format!("invalid factory address '{}': {e}", self.factory_address))
    }
}
