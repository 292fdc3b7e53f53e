//! Property-based checks for the invariants in `spec.md` §8, grounded on
//! the teacher's `proptest` dev-dependency.

use std::sync::Arc;

use alloy_primitives::U256;
use chain_indexer::chain::mock::MockChainClient;
use chain_indexer::chain::{Block, Receipt, ReceiptStatus, Transaction as ChainTransaction};
use chain_indexer::indexer::block_collector::BlockCollector;
use chain_indexer::indexer::confirmation_updater::ConfirmationUpdater;
use chain_indexer::store::mock::MockStore;
use chain_indexer::store::{Transaction as StoredTransaction, TxStatus, UuidGenerator};
use proptest::prelude::*;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

fn seed_tx(id: &str, block: u64, confirmations: u64) -> StoredTransaction {
    StoredTransaction {
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

proptest! {
    /// Confirmations never decrease across repeated updater ticks, for any
    /// sequence of non-decreasing head values (`spec.md` §8 invariant 2).
    #[test]
    fn confirmations_never_regress(heads in prop::collection::vec(0u64..100, 1..10)) {
        let mut heads = heads;
        heads.sort_unstable();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MockStore::new());
            store.insert_transactions_atomic(&[seed_tx("1", 5, 0)]).await.unwrap();
            let head = Arc::new(RwLock::new(0u64));
            let updater = ConfirmationUpdater::new(Arc::clone(&store), Arc::clone(&head), std::time::Duration::from_secs(1), CancellationToken::new());

            let mut last_confirmations = 0u64;
            for h in heads {
                *head.write().await = h;
                updater.tick().await.unwrap();
                let current = store.transactions()[0].confirmations;
                prop_assert!(current >= last_confirmations);
                last_confirmations = current;
            }
            Ok(())
        }).unwrap();
    }
}

#[tokio::test]
async fn cursor_is_monotonic_across_repeated_collector_passes() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MockStore::new());
    chain.set_accounts(["0xlocal".to_string()]);

    for n in 0..5u64 {
        chain.insert_block(Block {
            number: n,
            timestamp: n,
            transactions: vec![ChainTransaction { hash: format!("0xh{n}"), value: U256::from(n), to: Some("0xlocal".to_string()) }],
        });
        chain.insert_receipt(&format!("0xh{n}"), Receipt { status: ReceiptStatus::Successful, contract_address: None });
        chain.set_sender(&format!("0xh{n}"), "0xsender");
    }
    chain.set_head(10);

    let head = Arc::new(RwLock::new(10));
    let (tx, _rx) = mpsc::channel(1000);
    let collector = BlockCollector::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::new(UuidGenerator),
        head,
        CancellationToken::new(),
        std::time::Duration::from_millis(1),
        0,
        tx,
    );

    let mut cursor = 0u64;
    for _ in 0..5 {
        collector.process_block(cursor, 10).await.unwrap();
        let new_cursor = cursor + 1;
        assert!(new_cursor > cursor);
        cursor = new_cursor;
    }

    assert_eq!(store.transactions().len(), 5);
}
