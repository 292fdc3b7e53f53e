//! The capability surface the indexer consumes from an Ethereum-compatible
//! chain node. The core never depends on a concrete implementation; tests
//! substitute [`mock::MockChainClient`].

pub mod mock;
pub mod rpc_client;

use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::ChainError;

/// Status of a mined transaction, as reported by its receipt.
///
/// A receipt status outside these two values is mapped to `Other` and the
/// transaction carrying it is logged and dropped (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Failed,
    Successful,
    Other,
}

/// A transaction as exposed by a fetched [`Block`].
#[derive(Debug, Clone)]
pub struct Transaction {
    pub hash: String,
    pub value: U256,
    pub to: Option<String>,
}

/// A block fetched from the chain client.
#[derive(Debug, Clone)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
}

/// A transaction receipt.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub status: ReceiptStatus,
    /// Set when the transaction created a contract (`to` was absent).
    pub contract_address: Option<String>,
}

/// Whether the chain node has finished its initial sync. Mirrors
/// `original_source/eth/client.go`'s `SyncProgress` / `eth.WaitSync`: the
/// supervisor polls this before starting the four workers so that the
/// collector does not chase a head that is still catching up to the
/// network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub current_block: u64,
    pub highest_block: u64,
}

/// The capability surface in `spec.md` §4.1.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the highest block number currently observable from the node.
    async fn head(&self) -> Result<u64, ChainError>;

    /// Fetches the block at `number`, including its ordered transactions.
    async fn block_at(&self, number: u64) -> Result<Block, ChainError>;

    /// Fetches the receipt for `tx_hash`.
    async fn receipt(&self, tx_hash: &str) -> Result<Receipt, ChainError>;

    /// Fetches the balance of `address` as observed at `block`.
    async fn balance_at(&self, address: &str, block: u64) -> Result<U256, ChainError>;

    /// Returns the set of addresses this node considers local accounts.
    /// Fetched once per block attempt, since the set can change between
    /// blocks (`spec.md` §4.4 step 2).
    async fn accounts(&self) -> Result<HashSet<String>, ChainError>;

    /// Submits an outbound transfer, delegating signing to the node.
    async fn send_transfer(&self, from: &str, to: &str, amount: &U256) -> Result<String, ChainError>;

    /// Recovers the sender address of `tx` under this client's signer
    /// context (e.g. network/chain id). Unrecoverable senders are logged
    /// and the transaction is dropped, never retried (`spec.md` §4.4).
    async fn recover_sender(&self, tx: &Transaction) -> Result<String, ChainError>;

    /// Reports whether the node is still syncing. `None` once fully synced.
    async fn sync_progress(&self) -> Result<Option<SyncProgress>, ChainError>;
}
