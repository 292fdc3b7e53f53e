//! Owns the shared cancellation signal, starts the four workers, and waits
//! for them to drain on shutdown (`spec.md` §4.7).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainClient;
use crate::config::Config;
use crate::error::StartupError;
use crate::indexer::balance_updater::BalanceUpdater;
use crate::indexer::block_collector::BlockCollector;
use crate::indexer::confirmation_updater::ConfirmationUpdater;
use crate::indexer::head_tracker::HeadTracker;
use crate::store::{IdGenerator, Store};

/// Width of the balance-refresh queue (`spec.md` §5).
const BALANCE_QUEUE_CAPACITY: usize = 1000;

/// How long to wait between sync-progress polls at startup
/// (`original_source/main.go`'s `eth.WaitSync`, supplemented per
/// `SPEC_FULL.md` §6).
const SYNC_POLL_PAUSE: Duration = Duration::from_secs(5);

pub struct Supervisor {
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl Supervisor {
    /// Waits for the chain node to finish its initial sync, fetches the
    /// initial head synchronously, then launches the four workers.
    pub async fn start<C, S, I>(chain: Arc<C>, store: Arc<S>, id_gen: Arc<I>, config: &Config) -> Result<Self, StartupError>
    where
        C: ChainClient + 'static,
        S: Store + 'static,
        I: IdGenerator + 'static,
    {
        Self::wait_for_sync(chain.as_ref()).await;

        let initial_head = chain.head().await?;
        let head = Arc::new(RwLock::new(initial_head));
        let cancel = CancellationToken::new();
        let (balance_tx, balance_rx) = mpsc::channel(BALANCE_QUEUE_CAPACITY);

        let mut workers = JoinSet::new();

        let head_tracker =
            HeadTracker::new(Arc::clone(&chain), Arc::clone(&head), config.update_last_block_pause, cancel.clone());
        workers.spawn(head_tracker.run());

        let collector = BlockCollector::new(
            Arc::clone(&chain),
            Arc::clone(&store),
            Arc::clone(&id_gen),
            Arc::clone(&head),
            cancel.clone(),
            config.collect_pause,
            config.start_block,
            balance_tx,
        );
        workers.spawn(collector.run());

        let confirmation_updater =
            ConfirmationUpdater::new(Arc::clone(&store), Arc::clone(&head), config.update_transactions_pause, cancel.clone());
        workers.spawn(confirmation_updater.run());

        let balance_updater = BalanceUpdater::new(chain, store, id_gen, head, cancel.clone(), balance_rx);
        workers.spawn(balance_updater.run());

        tracing::info!(head = initial_head, "supervisor started four workers");
        Ok(Self { cancel, workers })
    }

    /// Signals cancellation and waits for every worker to drain. Never
    /// returns an error (`spec.md` §4.7, §7).
    pub async fn close(mut self) {
        tracing::info!("supervisor shutting down");
        self.cancel.cancel();
        while let Some(result) = self.workers.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "worker task panicked during shutdown");
            }
        }
        tracing::info!("supervisor drained all workers");
    }

    async fn wait_for_sync<C: ChainClient>(chain: &C) {
        loop {
            match chain.sync_progress().await {
                Ok(None) => return,
                Ok(Some(progress)) => {
                    tracing::info!(
                        current = progress.current_block,
                        highest = progress.highest_block,
                        "chain node still syncing, waiting"
                    );
                    tokio::time::sleep(SYNC_POLL_PAUSE).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to check sync progress, assuming synced");
                    return;
                }
            }
        }
    }
}
