//! The read-API surface the core implements (`spec.md` §6), exposed over
//! JSON-RPC. Grounded on `src/eth_rpc/api/eth_api.rs`'s `#[rpc(server)]`
//! macro usage.

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use serde::Serialize;

/// One entry returned by `getLast`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub hash: String,
    /// RFC 3339. A missing block timestamp renders as the Unix epoch.
    pub date: String,
    pub address: String,
    pub amount: String,
    pub confirmations: u64,
}

#[rpc(server, namespace = "indexer")]
pub trait IndexerApi {
    /// Returns up to `limit` deliverable transactions, marking each as
    /// delivered as a side effect (`spec.md` §6).
    #[method(name = "getLast")]
    async fn get_last(&self, limit: u64) -> RpcResult<Vec<TransactionResult>>;

    /// Validates `from`/`to`/`amount`, delegates to the chain client, and
    /// records an `outputs` row on success.
    #[method(name = "sendETH")]
    async fn send_eth(&self, from: String, to: String, amount: String) -> RpcResult<String>;

    /// Liveness probe, proxied from `/health` by the HTTP middleware.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<bool>;
}
