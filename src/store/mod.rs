//! The capability surface the indexer consumes for persistent state
//! (`spec.md` §4.2, §6). The relational driver and schema migrations
//! backing a production deployment are out of scope for the core; the
//! trait is the contract, [`mock::MockStore`] is what the core's own test
//! suite runs against, and [`mongo::MongoStore`] is a runnable reference
//! adapter kept out of the hot path of the indexing algorithms.

pub mod mock;
pub mod mongo;

use alloy_primitives::U256;
use async_trait::async_trait;

use crate::error::StoreError;

/// One of the two terminal states a receipt can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Failed,
    Successful,
}

impl TxStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Successful => "successful",
        }
    }
}

/// A persisted transaction row (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: U256,
    pub status: Option<TxStatus>,
    pub block: Option<u64>,
    pub timestamp: Option<u64>,
    pub marked: bool,
    pub confirmations: u64,
}

/// A persisted account row.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub public_key: String,
    pub balance: U256,
}

/// A persisted output row, recording a transfer initiated through the API.
#[derive(Debug, Clone)]
pub struct Output {
    pub id: String,
    pub hash: String,
    pub account: String,
}

/// The well-known settings key holding the collector's cursor.
pub const LAST_BLOCK_KEY: &str = "lastBlock";

/// The capability surface in `spec.md` §4.2.
#[async_trait]
pub trait Store: Send + Sync {
    /// Looks up a setting by key. Returns `None` if absent (never seen a
    /// successful block yet, for `lastBlock`).
    async fn find_setting_by_key(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Upserts a setting value.
    async fn save_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Inserts every row in `transactions` as a single atomic unit: either
    /// all land or none do (`spec.md` invariant 3).
    async fn insert_transactions_atomic(&self, transactions: &[Transaction]) -> Result<(), StoreError>;

    /// Selects transactions whose `confirmations` is at most `max_confirmations`.
    async fn select_transactions_confirmations_at_most(
        &self,
        max_confirmations: u64,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Selects up to `limit` transactions whose `to` matches a known
    /// account and whose `confirmations < 3` or `marked = false`, ordered
    /// by block ascending (`spec.md` §6 `getLast`).
    async fn select_deliverable_transactions(&self, limit: u64) -> Result<Vec<Transaction>, StoreError>;

    /// Persists an updated transaction row (confirmations and/or marked).
    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Looks up an account by its public address.
    async fn find_account_by_public_key(&self, address: &str) -> Result<Option<Account>, StoreError>;

    /// Inserts or updates an account row.
    async fn upsert_account(&self, account: Account) -> Result<(), StoreError>;

    /// Records an outbound transfer initiated through the API.
    async fn insert_output(&self, output: Output) -> Result<(), StoreError>;
}

/// Generates opaque unique identities for new rows. UUID generation is
/// treated as an external collaborator (`spec.md` §1); [`UuidGenerator`] is
/// the default production implementation.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
