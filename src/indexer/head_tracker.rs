//! Periodically refreshes the cached chain head (`spec.md` §4.3).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainClient;

/// Runs the head-refresh loop, grounded on `src/retry/mod.rs`'s
/// `RetryHandler`: log-and-continue on error, fixed sleep between ticks.
pub struct HeadTracker<C: ChainClient> {
    chain: Arc<C>,
    head: Arc<RwLock<u64>>,
    pause: Duration,
    cancel: CancellationToken,
}

impl<C> HeadTracker<C>
where
    C: ChainClient + 'static,
{
    pub fn new(chain: Arc<C>, head: Arc<RwLock<u64>>, pause: Duration, cancel: CancellationToken) -> Self {
        Self { chain, head, pause, cancel }
    }

    /// Runs until the cancellation signal fires, then returns.
    pub async fn run(self) {
        tracing::info!("starting head tracker");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("head tracker cancelled");
                    return;
                }
                () = tokio::time::sleep(self.pause) => {}
            }

            match self.chain.head().await {
                Ok(new_head) => {
                    let mut guard = self.head.write().await;
                    *guard = new_head;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to refresh chain head");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainClient;

    #[tokio::test]
    async fn refreshes_head_until_cancelled() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_head(5);
        let head = Arc::new(RwLock::new(0));
        let cancel = CancellationToken::new();

        let tracker = HeadTracker::new(Arc::clone(&chain), Arc::clone(&head), Duration::from_millis(1), cancel.clone());
        let handle = tokio::spawn(tracker.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*head.read().await, 5);

        cancel.cancel();
        handle.await.unwrap();
    }
}
