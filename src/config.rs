use std::env::var;
use std::net::SocketAddr;
use std::time::Duration;

use eyre::{eyre, Result};

/// Configuration consumed by the indexing core. None of these values are
/// produced by the core; they are read once at startup.
///
/// Mirrors the shape of the teacher's `RPCConfig::from_env` /
/// `KakarotRpcConfig::from_env`, generalized to the settings this indexer
/// needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// How often the head tracker refreshes the cached chain head.
    pub update_last_block_pause: Duration,
    /// How often the block collector retries after hitting the head or an
    /// error.
    pub collect_pause: Duration,
    /// How often the confirmation updater re-scans not-yet-final
    /// transactions.
    pub update_transactions_pause: Duration,
    /// Floor applied to the persisted cursor at startup.
    pub start_block: u64,
    /// Chain-node JSON-RPC endpoint.
    pub chain_rpc_url: String,
    /// MongoDB connection string backing the [`crate::store::Store`].
    pub database_url: String,
    /// Database name.
    pub database_name: String,
    /// JSON-RPC HTTP listen address.
    pub rpc_listen_addr: SocketAddr,
}

impl Config {
    /// Builds a [`Config`] from environment variables, applying the same
    /// defaults as `original_source/config/config.go`'s `NewConfig`
    /// (15 second chain-head poll) where the distilled spec does not
    /// mandate a different one.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            update_last_block_pause: Duration::from_millis(env_u64_or("UPDATE_LAST_BLOCK_PAUSE_MS", 15_000)?),
            collect_pause: Duration::from_millis(env_u64_or("COLLECT_PAUSE_MS", 2_000)?),
            update_transactions_pause: Duration::from_millis(env_u64_or("UPDATE_TRANSACTIONS_PAUSE_MS", 20_000)?),
            start_block: env_u64_or("START_BLOCK", 0)?,
            chain_rpc_url: var("CHAIN_RPC_URL").map_err(|_| eyre!("missing CHAIN_RPC_URL"))?,
            database_url: var("DATABASE_URL").unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database_name: var("DATABASE_NAME").unwrap_or_else(|_| "chain_indexer".to_string()),
            rpc_listen_addr: var("RPC_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8545".to_string())
                .parse()
                .map_err(|e| eyre!("invalid RPC_LISTEN_ADDR: {e}"))?,
        })
    }
}

fn env_u64_or(name: &str, default: u64) -> Result<u64> {
    match var(name) {
        Ok(raw) => raw.parse::<u64>().map_err(|e| eyre!("invalid {name}: {e}")),
        Err(_) => Ok(default),
    }
}
