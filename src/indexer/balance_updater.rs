//! Consumes the balance-refresh queue and keeps account balances current
//! (`spec.md` §4.6).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::chain::ChainClient;
use crate::store::{Account, IdGenerator, Store};

pub struct BalanceUpdater<C: ChainClient, S: Store, I: IdGenerator> {
    chain: Arc<C>,
    store: Arc<S>,
    id_gen: Arc<I>,
    head: Arc<RwLock<u64>>,
    cancel: CancellationToken,
    balance_rx: mpsc::Receiver<HashSet<String>>,
}

impl<C, S, I> BalanceUpdater<C, S, I>
where
    C: ChainClient + 'static,
    S: Store + 'static,
    I: IdGenerator + 'static,
{
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        id_gen: Arc<I>,
        head: Arc<RwLock<u64>>,
        cancel: CancellationToken,
        balance_rx: mpsc::Receiver<HashSet<String>>,
    ) -> Self {
        Self { chain, store, id_gen, head, cancel, balance_rx }
    }

    pub async fn run(mut self) {
        tracing::info!("starting balance updater");

        match self.chain.accounts().await {
            Ok(accounts) => self.refresh_batch(&accounts).await,
            Err(err) => tracing::warn!(error = %err, "failed to fetch local accounts for initial balance seed"),
        }

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("balance updater cancelled");
                    return;
                }
                batch = self.balance_rx.recv() => {
                    match batch {
                        Some(addresses) => self.refresh_batch(&addresses).await,
                        None => {
                            tracing::info!("balance-refresh queue closed, stopping balance updater");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn refresh_batch(&self, addresses: &HashSet<String>) {
        let head = *self.head.read().await;
        for address in addresses {
            if let Err(err) = self.refresh_one(address, head).await {
                tracing::warn!(error = %err, address = %address, "failed to refresh balance");
            }
        }
    }

    async fn refresh_one(&self, address: &str, head: u64) -> Result<(), crate::error::ChainError> {
        let balance = self.chain.balance_at(address, head).await?;
        let existing = self.store.find_account_by_public_key(address).await;
        let account = match existing {
            Ok(Some(mut account)) => {
                account.balance = balance;
                account
            }
            Ok(None) | Err(_) => Account { id: self.id_gen.next_id(), public_key: address.to_string(), balance },
        };

        if let Err(err) = self.store.upsert_account(account).await {
            tracing::warn!(error = %err, address = %address, "failed to upsert account");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;
    use crate::store::mock::MockStore;
    use crate::store::UuidGenerator;
    use alloy_primitives::U256;

    #[tokio::test]
    async fn refreshes_balances_for_a_delivered_batch() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_balance("0xaaa", 10, U256::from(42u64));
        let store = Arc::new(MockStore::new());
        let head = Arc::new(RwLock::new(10));
        let (tx, rx) = mpsc::channel(10);

        let updater = BalanceUpdater::new(chain, Arc::clone(&store), Arc::new(UuidGenerator), head, CancellationToken::new(), rx);
        let handle = tokio::spawn(updater.run());

        tx.send(["0xaaa".to_string()].into_iter().collect()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let accounts = store.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, U256::from(42u64));

        drop(tx);
        handle.await.unwrap();
    }
}
