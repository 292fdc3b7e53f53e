//! Exercises the read API surface against in-memory collaborators
//! (`spec.md` §6, §8 scenario 5), grounded on the teacher's `rstest` +
//! `tokio::test` integration-test style (`tests/eth_api.rs`).

use std::sync::Arc;

use alloy_primitives::U256;
use chain_indexer::chain::mock::MockChainClient;
use chain_indexer::rpc::api::IndexerApiServer;
use chain_indexer::rpc::server::IndexerRpc;
use chain_indexer::store::mock::MockStore;
use chain_indexer::store::{Transaction, TxStatus, UuidGenerator};
use rstest::rstest;

fn seed_transaction(id: &str, to: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        hash: format!("0x{id}"),
        from: "0xfrom".to_string(),
        to: to.to_string(),
        amount: U256::from(1000u64),
        status: Some(TxStatus::Successful),
        block: Some(10),
        timestamp: Some(1_700_000_000),
        marked: false,
        confirmations: 0,
    }
}

#[rstest]
#[tokio::test]
async fn get_last_does_not_redeliver_after_marking() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MockStore::new());
    store.upsert_account(chain_indexer::store::Account {
        id: "acc-1".to_string(),
        public_key: "0xlocal".to_string(),
        balance: U256::ZERO,
    })
    .await
    .unwrap();
    store.insert_transactions_atomic(&[seed_transaction("1", "0xlocal"), seed_transaction("2", "0xlocal")]).await.unwrap();

    let rpc = IndexerRpc::new(chain, store, Arc::new(UuidGenerator));

    let first = rpc.get_last(100).await.unwrap();
    assert_eq!(first.len(), 2);

    let second = rpc.get_last(100).await.unwrap();
    assert!(second.is_empty(), "marked+low-confirmation rows must not be redelivered");
}

#[rstest]
#[tokio::test]
async fn send_eth_rejects_non_hex_address() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MockStore::new());
    let rpc = IndexerRpc::new(chain, store, Arc::new(UuidGenerator));

    let result = rpc.send_eth("not-hex".to_string(), "0xbbb".to_string(), "100".to_string()).await;
    assert!(result.is_err());
}

#[rstest]
#[tokio::test]
async fn send_eth_rejects_non_numeric_amount() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MockStore::new());
    let rpc = IndexerRpc::new(chain, store, Arc::new(UuidGenerator));

    let result = rpc.send_eth("0xaaa".to_string(), "0xbbb".to_string(), "not-a-number".to_string()).await;
    assert!(result.is_err());
}

#[rstest]
#[tokio::test]
async fn send_eth_delegates_and_records_output() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_next_send_hash("0xsenttxhash");
    let store = Arc::new(MockStore::new());
    let rpc = IndexerRpc::new(Arc::clone(&chain), Arc::clone(&store), Arc::new(UuidGenerator));

    let tx_hash = rpc.send_eth("0xAAA".to_string(), "0xBBB".to_string(), "1000".to_string()).await.unwrap();

    assert_eq!(tx_hash, "0xsenttxhash");
    assert_eq!(chain.sent_transfers(), vec![("0xaaa".to_string(), "0xbbb".to_string(), U256::from(1000u64))]);
    assert_eq!(store.outputs().len(), 1);
    assert_eq!(store.outputs()[0].account, "0xaaa");
}
