//! Periodically raises confirmations on stored transactions whose block is
//! below the head (`spec.md` §4.5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::store::Store;

/// Above this depth a transaction is considered final and never revisited.
const FINALITY_THRESHOLD: u64 = 6;

pub struct ConfirmationUpdater<S: Store> {
    store: Arc<S>,
    head: Arc<RwLock<u64>>,
    pause: Duration,
    cancel: CancellationToken,
}

impl<S> ConfirmationUpdater<S>
where
    S: Store + 'static,
{
    pub fn new(store: Arc<S>, head: Arc<RwLock<u64>>, pause: Duration, cancel: CancellationToken) -> Self {
        Self { store, head, pause, cancel }
    }

    pub async fn run(self) {
        tracing::info!("starting confirmation updater");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("confirmation updater cancelled");
                    return;
                }
                () = tokio::time::sleep(self.pause) => {}
            }

            if let Err(err) = self.tick().await {
                tracing::warn!(error = %err, "confirmation updater tick failed to select rows");
            }
        }
    }

    /// Runs a single tick: selects not-yet-final rows and raises their
    /// confirmations against the current head. Exposed for tests that drive
    /// the updater deterministically rather than waiting on its timer.
    pub async fn tick(&self) -> Result<(), crate::error::StoreError> {
        let rows = self.store.select_transactions_confirmations_at_most(FINALITY_THRESHOLD).await?;
        let head = *self.head.read().await;

        for mut row in rows {
            let Some(block) = row.block else { continue };
            if block >= head {
                continue;
            }
            let new_confirm = head - block;
            if new_confirm > row.confirmations {
                row.confirmations = new_confirm;
                if let Err(err) = self.store.update_transaction(&row).await {
                    tracing::warn!(error = %err, id = %row.id, "failed to persist updated confirmations");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockStore;
    use crate::store::{Transaction, TxStatus};
    use alloy_primitives::U256;

    fn tx(id: &str, block: u64, confirmations: u64) -> Transaction {
        Transaction {
            id: id.to_string(),
            hash: format!("0x{id}"),
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            amount: U256::from(1u64),
            status: Some(TxStatus::Successful),
            block: Some(block),
            timestamp: Some(0),
            marked: false,
            confirmations,
        }
    }

    #[tokio::test]
    async fn raises_confirmations_without_regressing() {
        let store = Arc::new(MockStore::new());
        store.insert_transactions_atomic(&[tx("1", 10, 1)]).await.unwrap();
        let head = Arc::new(RwLock::new(20));

        let updater = ConfirmationUpdater::new(Arc::clone(&store), Arc::clone(&head), Duration::from_millis(1), CancellationToken::new());
        updater.tick().await.unwrap();
        assert_eq!(store.transactions()[0].confirmations, 19);

        updater.tick().await.unwrap();
        assert_eq!(store.transactions()[0].confirmations, 19);
    }

    #[tokio::test]
    async fn never_revisits_rows_above_threshold() {
        let store = Arc::new(MockStore::new());
        store.insert_transactions_atomic(&[tx("1", 10, 7)]).await.unwrap();
        let head = Arc::new(RwLock::new(1000));

        let updater = ConfirmationUpdater::new(Arc::clone(&store), head, Duration::from_millis(1), CancellationToken::new());
        updater.tick().await.unwrap();
        assert_eq!(store.transactions()[0].confirmations, 7);
    }
}
