//! In-memory [`Store`] used by the indexer's test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{Account, Output, Store, Transaction};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MockStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    settings: HashMap<String, String>,
    transactions: Vec<Transaction>,
    accounts: HashMap<String, Account>,
    outputs: Vec<Output>,
    /// When set, the next call to `insert_transactions_atomic` fails and
    /// leaves the store untouched, to exercise the collector's retry path.
    fail_next_insert: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arranges for the next atomic insert to fail, simulating a store
    /// write error (`spec.md` §4.4 step 9 / §7 taxonomy item 3).
    pub fn fail_next_insert(&self) {
        self.inner.lock().unwrap().fail_next_insert = true;
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().transactions.clone()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.inner.lock().unwrap().accounts.values().cloned().collect()
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.inner.lock().unwrap().outputs.clone()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn find_setting_by_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().settings.get(key).cloned())
    }

    async fn save_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn insert_transactions_atomic(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_insert {
            inner.fail_next_insert = false;
            return Err(StoreError::Insert("simulated write failure".to_string()));
        }
        inner.transactions.extend_from_slice(transactions);
        Ok(())
    }

    async fn select_transactions_confirmations_at_most(
        &self,
        max_confirmations: u64,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|tx| tx.confirmations <= max_confirmations)
            .cloned()
            .collect())
    }

    async fn select_deliverable_transactions(&self, limit: u64) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let known: std::collections::HashSet<&str> = inner.accounts.keys().map(String::as_str).collect();
        let mut matching: Vec<Transaction> = inner
            .transactions
            .iter()
            .filter(|tx| known.contains(tx.to.as_str()) && (tx.confirmations < 3 || !tx.marked))
            .cloned()
            .collect();
        matching.sort_by_key(|tx| tx.block.unwrap_or(0));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.transactions.iter_mut().find(|tx| tx.id == transaction.id) {
            *existing = transaction.clone();
            Ok(())
        } else {
            Err(StoreError::Update(format!("no such transaction {}", transaction.id)))
        }
    }

    async fn find_account_by_public_key(&self, address: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.lock().unwrap().accounts.get(address).cloned())
    }

    async fn upsert_account(&self, account: Account) -> Result<(), StoreError> {
        self.inner.lock().unwrap().accounts.insert(account.public_key.clone(), account);
        Ok(())
    }

    async fn insert_output(&self, output: Output) -> Result<(), StoreError> {
        self.inner.lock().unwrap().outputs.push(output);
        Ok(())
    }
}
