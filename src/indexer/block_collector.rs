//! Walks blocks from the persisted cursor to the cached head, fans out
//! receipt enrichment across a bounded worker pool, persists atomically,
//! advances the cursor (`spec.md` §4.4). The central, most complex loop.
//!
//! Known limitation (`spec.md` §9): a transaction whose receipt fetch fails
//! is dropped rather than retried, so a block can advance with rows
//! missing. This favors forward progress over completeness and is the
//! observed behavior of the system this was distilled from.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainClient, ReceiptStatus};
use crate::store::{self, IdGenerator, Store, LAST_BLOCK_KEY};

const BALANCE_QUEUE_OFFER_TIMEOUT: Duration = Duration::from_secs(1);

pub struct BlockCollector<C: ChainClient, S: Store, I: IdGenerator> {
    chain: Arc<C>,
    store: Arc<S>,
    id_gen: Arc<I>,
    head: Arc<RwLock<u64>>,
    cancel: CancellationToken,
    collect_pause: Duration,
    start_block: u64,
    concurrency: usize,
    balance_tx: mpsc::Sender<HashSet<String>>,
}

impl<C, S, I> BlockCollector<C, S, I>
where
    C: ChainClient + 'static,
    S: Store + 'static,
    I: IdGenerator + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        id_gen: Arc<I>,
        head: Arc<RwLock<u64>>,
        cancel: CancellationToken,
        collect_pause: Duration,
        start_block: u64,
        balance_tx: mpsc::Sender<HashSet<String>>,
    ) -> Self {
        Self {
            chain,
            store,
            id_gen,
            head,
            cancel,
            collect_pause,
            start_block,
            concurrency: num_cpus::get(),
            balance_tx,
        }
    }

    pub async fn run(self) {
        tracing::info!("starting block collector");
        let mut cursor = match self.initial_cursor().await {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::error!(error = %err, "failed to read persisted cursor, starting from configured floor");
                self.start_block
            }
        };

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("block collector cancelled");
                return;
            }

            let head = *self.head.read().await;
            if cursor > head {
                tokio::select! {
                    () = self.cancel.cancelled() => return,
                    () = tokio::time::sleep(self.collect_pause) => {}
                }
                continue;
            }

            match self.process_block(cursor, head).await {
                Ok(()) => {
                    cursor += 1;
                }
                Err(()) => {
                    tokio::select! {
                        () = self.cancel.cancelled() => return,
                        () = tokio::time::sleep(self.collect_pause) => {}
                    }
                }
            }
        }
    }

    async fn initial_cursor(&self) -> Result<u64, crate::error::StoreError> {
        let persisted = self.store.find_setting_by_key(LAST_BLOCK_KEY).await?;
        let persisted = persisted.and_then(|raw| raw.parse::<u64>().ok()).unwrap_or(0);
        Ok(persisted.max(self.start_block))
    }

    /// Processes the block at `cursor`. Returns `Err(())` to signal "retry
    /// this same block after the pause", `Ok(())` to signal "advance".
    /// Exposed for tests that drive the collector one block at a time
    /// instead of running its full tick loop.
    pub async fn process_block(&self, cursor: u64, head: u64) -> Result<(), ()> {
        let local_accounts = match self.chain.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::warn!(error = %err, block = cursor, "failed to fetch local accounts");
                return Err(());
            }
        };

        let block = match self.chain.block_at(cursor).await {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!(error = %err, block = cursor, "failed to fetch block");
                return Err(());
            }
        };

        if block.transactions.is_empty() {
            self.persist_cursor(cursor + 1).await;
            return Ok(());
        }

        let confirm = head.saturating_sub(block.number);
        let (records, targets) = self.enrich_transactions(&block.transactions, &local_accounts, block.number, block.timestamp, confirm).await;

        if !targets.is_empty() {
            self.offer_balance_refresh(targets).await;
        }

        if let Err(err) = self.store.insert_transactions_atomic(&records).await {
            tracing::warn!(error = %err, block = cursor, "atomic transaction insert failed, retrying block");
            return Err(());
        }

        self.persist_cursor(cursor + 1).await;
        Ok(())
    }

    async fn persist_cursor(&self, next: u64) {
        if let Err(err) = self.store.save_setting(LAST_BLOCK_KEY, &next.to_string()).await {
            tracing::error!(error = %err, cursor = next, "failed to persist cursor");
        }
    }

    async fn offer_balance_refresh(&self, targets: HashSet<String>) {
        match tokio::time::timeout(BALANCE_QUEUE_OFFER_TIMEOUT, self.balance_tx.send(targets)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::warn!("balance-refresh queue closed"),
            Err(_) => tracing::warn!("balance-refresh queue full, dropping batch"),
        }
    }

    async fn enrich_transactions(
        &self,
        transactions: &[crate::chain::Transaction],
        local_accounts: &HashSet<String>,
        block_number: u64,
        block_timestamp: u64,
        confirm: u64,
    ) -> (Vec<store::Transaction>, HashSet<String>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut joinset = JoinSet::new();

        for tx in transactions.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let chain = Arc::clone(&self.chain);
            let id_gen = Arc::clone(&self.id_gen);
            let local_accounts = local_accounts.clone();

            joinset.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                enrich_one(chain.as_ref(), id_gen.as_ref(), &tx, &local_accounts, block_number, block_timestamp, confirm).await
            });
        }

        let mut records = Vec::new();
        let mut targets = HashSet::new();
        while let Some(result) = joinset.join_next().await {
            match result {
                Ok(Some((record, addresses))) => {
                    records.push(record);
                    targets.extend(addresses);
                }
                Ok(None) => {}
                Err(err) => tracing::error!(error = %err, "receipt-enrichment worker panicked"),
            }
        }

        (records, targets)
    }
}

async fn enrich_one<C: ChainClient, I: IdGenerator>(
    chain: &C,
    id_gen: &I,
    tx: &crate::chain::Transaction,
    local_accounts: &HashSet<String>,
    block_number: u64,
    block_timestamp: u64,
    confirm: u64,
) -> Option<(store::Transaction, HashSet<String>)> {
    let from = match chain.recover_sender(tx).await {
        Ok(from) => from.to_lowercase(),
        Err(err) => {
            tracing::warn!(error = %err, hash = %tx.hash, "unrecoverable sender, dropping transaction");
            return None;
        }
    };

    let receipt = match chain.receipt(&tx.hash).await {
        Ok(receipt) => receipt,
        Err(err) => {
            tracing::warn!(error = %err, hash = %tx.hash, "failed to fetch receipt, dropping transaction");
            return None;
        }
    };

    let to = tx.to.clone().or_else(|| receipt.contract_address.clone());
    let Some(to) = to.map(|to| to.to_lowercase()) else {
        tracing::warn!(hash = %tx.hash, "transaction has neither a recipient nor a contract address, dropping");
        return None;
    };

    let mut targets = HashSet::new();
    if local_accounts.contains(&from) {
        targets.insert(from.clone());
    }
    if local_accounts.contains(&to) {
        targets.insert(to.clone());
    }
    if targets.is_empty() {
        return None;
    }

    let status = match receipt.status {
        ReceiptStatus::Failed => store::TxStatus::Failed,
        ReceiptStatus::Successful => store::TxStatus::Successful,
        ReceiptStatus::Other => {
            tracing::warn!(hash = %tx.hash, "unknown receipt status, dropping transaction");
            return None;
        }
    };

    let record = store::Transaction {
        id: id_gen.next_id(),
        hash: tx.hash.to_lowercase(),
        from,
        to,
        amount: tx.value,
        status: Some(status),
        block: Some(block_number),
        timestamp: Some(block_timestamp),
        marked: false,
        confirmations: confirm,
    };

    Some((record, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;
    use crate::chain::{Block, Receipt};
    use crate::store::mock::MockStore;
    use crate::store::UuidGenerator;
    use alloy_primitives::U256;

    fn setup() -> (Arc<MockChainClient>, Arc<MockStore>, Arc<UuidGenerator>, Arc<RwLock<u64>>) {
        (Arc::new(MockChainClient::new()), Arc::new(MockStore::new()), Arc::new(UuidGenerator), Arc::new(RwLock::new(0)))
    }

    #[tokio::test]
    async fn empty_block_advances_cursor_without_inserting_rows() {
        let (chain, store, id_gen, head) = setup();
        chain.set_head(100);
        chain.insert_block(Block { number: 100, timestamp: 0, transactions: vec![] });
        *head.write().await = 100;

        let (tx, _rx) = mpsc::channel(1000);
        let collector =
            BlockCollector::new(Arc::clone(&chain), Arc::clone(&store), id_gen, head, CancellationToken::new(), Duration::from_millis(1), 100, tx);

        collector.process_block(100, 100).await.unwrap();

        assert!(store.transactions().is_empty());
        assert_eq!(store.find_setting_by_key(LAST_BLOCK_KEY).await.unwrap(), Some("101".to_string()));
    }

    #[tokio::test]
    async fn single_matching_transaction_is_persisted_lowercased() {
        let (chain, store, id_gen, head) = setup();
        chain.set_head(200);
        chain.set_accounts(["0xaaa".to_string()]);
        chain.insert_block(Block {
            number: 150,
            timestamp: 1000,
            transactions: vec![crate::chain::Transaction { hash: "0xHASH".to_string(), value: U256::from(1000u64), to: Some("0xBBB".to_string()) }],
        });
        chain.insert_receipt("0xHASH", Receipt { status: ReceiptStatus::Successful, contract_address: None });
        chain.set_sender("0xHASH", "0xAAA");

        let (btx, mut brx) = mpsc::channel(1000);
        let collector =
            BlockCollector::new(Arc::clone(&chain), Arc::clone(&store), id_gen, Arc::clone(&head), CancellationToken::new(), Duration::from_millis(1), 0, btx);

        collector.process_block(150, 200).await.unwrap();

        let rows = store.transactions();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.from, "0xaaa");
        assert_eq!(row.to, "0xbbb");
        assert_eq!(row.amount, U256::from(1000u64));
        assert_eq!(row.confirmations, 50);
        assert_eq!(row.block, Some(150));
        assert!(!row.marked);

        let batch = brx.try_recv().unwrap();
        assert!(batch.contains("0xaaa"));
    }

    #[tokio::test]
    async fn non_matching_transaction_is_dropped() {
        let (chain, store, id_gen, head) = setup();
        chain.set_accounts(["0xlocal".to_string()]);
        chain.insert_block(Block {
            number: 10,
            timestamp: 0,
            transactions: vec![crate::chain::Transaction { hash: "0xh".to_string(), value: U256::from(1u64), to: Some("0xother".to_string()) }],
        });
        chain.insert_receipt("0xh", Receipt { status: ReceiptStatus::Successful, contract_address: None });
        chain.set_sender("0xh", "0xanotherother");

        let (btx, _brx) = mpsc::channel(1000);
        let collector =
            BlockCollector::new(Arc::clone(&chain), Arc::clone(&store), id_gen, head, CancellationToken::new(), Duration::from_millis(1), 0, btx);

        collector.process_block(10, 10).await.unwrap();
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn contract_creation_uses_receipt_contract_address() {
        let (chain, store, id_gen, head) = setup();
        chain.set_accounts(["0xccc".to_string()]);
        chain.insert_block(Block {
            number: 5,
            timestamp: 0,
            transactions: vec![crate::chain::Transaction { hash: "0xh".to_string(), value: U256::from(1u64), to: None }],
        });
        chain.insert_receipt("0xh", Receipt { status: ReceiptStatus::Successful, contract_address: Some("0xCCC".to_string()) });
        chain.set_sender("0xh", "0xsender");

        let (btx, _brx) = mpsc::channel(1000);
        let collector =
            BlockCollector::new(Arc::clone(&chain), Arc::clone(&store), id_gen, head, CancellationToken::new(), Duration::from_millis(1), 0, btx);

        collector.process_block(5, 5).await.unwrap();
        let rows = store.transactions();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to, "0xccc");
    }
}
