//! In-memory [`ChainClient`] used by the indexer's test suite. Mirrors
//! `original_source/eth/mock.go`'s `MockClient`: a hand-fillable fixture,
//! not a simulated EVM.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{Block, ChainClient, Receipt, SyncProgress, Transaction};
use crate::error::ChainError;

/// A scriptable [`ChainClient`]. Every method reads from state seeded by the
/// test; `head` and `accounts` are the only fields workers read on every
/// tick, so they are behind a [`Mutex`] to let tests mutate them between
/// polls.
#[derive(Debug, Default)]
pub struct MockChainClient {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    head: u64,
    blocks: HashMap<u64, Block>,
    receipts: HashMap<String, Receipt>,
    balances: HashMap<(String, u64), U256>,
    accounts: HashSet<String>,
    /// tx hash -> recovered sender. Absent entries fail recovery.
    senders: HashMap<String, String>,
    sync_progress: Option<SyncProgress>,
    sent_transfers: Vec<(String, String, U256)>,
    next_send_hash: String,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { next_send_hash: "0xsent".to_string(), ..Inner::default() }) }
    }

    pub fn set_head(&self, head: u64) {
        self.inner.lock().unwrap().head = head;
    }

    pub fn insert_block(&self, block: Block) {
        self.inner.lock().unwrap().blocks.insert(block.number, block);
    }

    pub fn insert_receipt(&self, hash: &str, receipt: Receipt) {
        self.inner.lock().unwrap().receipts.insert(hash.to_string(), receipt);
    }

    pub fn set_balance(&self, address: &str, block: u64, balance: U256) {
        self.inner.lock().unwrap().balances.insert((address.to_string(), block), balance);
    }

    pub fn set_accounts(&self, accounts: impl IntoIterator<Item = String>) {
        self.inner.lock().unwrap().accounts = accounts.into_iter().collect();
    }

    pub fn set_sender(&self, tx_hash: &str, sender: &str) {
        self.inner.lock().unwrap().senders.insert(tx_hash.to_string(), sender.to_string());
    }

    pub fn set_sync_progress(&self, progress: Option<SyncProgress>) {
        self.inner.lock().unwrap().sync_progress = progress;
    }

    pub fn set_next_send_hash(&self, hash: &str) {
        self.inner.lock().unwrap().next_send_hash = hash.to_string();
    }

    pub fn sent_transfers(&self) -> Vec<(String, String, U256)> {
        self.inner.lock().unwrap().sent_transfers.clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn head(&self) -> Result<u64, ChainError> {
        Ok(self.inner.lock().unwrap().head)
    }

    async fn block_at(&self, number: u64) -> Result<Block, ChainError> {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| ChainError::Block(number, "no such block".to_string()))
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Receipt, ChainError> {
        self.inner
            .lock()
            .unwrap()
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Receipt(tx_hash.to_string(), "no such receipt".to_string()))
    }

    async fn balance_at(&self, address: &str, block: u64) -> Result<U256, ChainError> {
        Ok(self.inner.lock().unwrap().balances.get(&(address.to_string(), block)).copied().unwrap_or_default())
    }

    async fn accounts(&self) -> Result<HashSet<String>, ChainError> {
        Ok(self.inner.lock().unwrap().accounts.clone())
    }

    async fn send_transfer(&self, from: &str, to: &str, amount: &U256) -> Result<String, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent_transfers.push((from.to_string(), to.to_string(), *amount));
        Ok(inner.next_send_hash.clone())
    }

    async fn recover_sender(&self, tx: &Transaction) -> Result<String, ChainError> {
        self.inner
            .lock()
            .unwrap()
            .senders
            .get(&tx.hash)
            .cloned()
            .ok_or_else(|| ChainError::SenderRecovery(tx.hash.clone(), "unrecoverable signature".to_string()))
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, ChainError> {
        Ok(self.inner.lock().unwrap().sync_progress)
    }
}
