//! Implementation of [`crate::rpc::api::IndexerApiServer`], grounded on
//! `src/eth_rpc/servers/eth_rpc.rs`'s `KakarotEthRpc`.

use std::sync::Arc;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::types::ErrorObject;
use tokio::sync::Mutex;

use crate::chain::ChainClient;
use crate::error::ApiError;
use crate::rpc::api::{IndexerApiServer, TransactionResult};
use crate::store::{IdGenerator, Output, Store};

fn rpc_error(err: ApiError) -> ErrorObject<'static> {
    match err {
        ApiError::InvalidInput { field, reason } => {
            ErrorObject::owned(-32602, format!("invalid \"{field}\" argument: {reason}"), None::<()>)
        }
        ApiError::Backend => ErrorObject::owned(-32000, "backend request failed", None::<()>),
    }
}

fn normalize_hex_address(field: &'static str, raw: &str) -> Result<String, ApiError> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::InvalidInput { field, reason: "not a hex address".to_string() });
    }
    Ok(format!("0x{}", stripped.to_lowercase()))
}

fn parse_amount(raw: &str) -> Result<U256, ApiError> {
    raw.parse::<U256>().map_err(|_| ApiError::InvalidInput { field: "amount", reason: "not a valid integer".to_string() })
}

/// Renders a block timestamp as RFC 3339, defaulting to the Unix epoch when
/// absent (`spec.md` §6).
fn render_date(timestamp: Option<u64>) -> String {
    let seconds = timestamp.unwrap_or(0);
    DateTime::<Utc>::from_timestamp(seconds as i64, 0).unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap()).to_rfc3339()
}

pub struct IndexerRpc<C: ChainClient, S: Store, I: IdGenerator> {
    chain: Arc<C>,
    store: Arc<S>,
    id_gen: Arc<I>,
    /// Serializes the list-then-mark sequence against concurrent API callers
    /// (`SPEC_FULL.md` §6, preserving `original_source/api/handler.go`'s
    /// mutex).
    read_lock: Mutex<()>,
}

impl<C, S, I> IndexerRpc<C, S, I>
where
    C: ChainClient,
    S: Store,
    I: IdGenerator,
{
    pub fn new(chain: Arc<C>, store: Arc<S>, id_gen: Arc<I>) -> Self {
        Self { chain, store, id_gen, read_lock: Mutex::new(()) }
    }
}

#[async_trait]
impl<C, S, I> IndexerApiServer for IndexerRpc<C, S, I>
where
    C: ChainClient + 'static,
    S: Store + 'static,
    I: IdGenerator + 'static,
{
    #[tracing::instrument(skip(self), err)]
    async fn get_last(&self, limit: u64) -> RpcResult<Vec<TransactionResult>> {
        let _guard = self.read_lock.lock().await;

        let rows = self.store.select_deliverable_transactions(limit).await.map_err(ApiError::from).map_err(rpc_error)?;

        let mut results = Vec::with_capacity(rows.len());
        for mut row in rows {
            results.push(TransactionResult {
                hash: row.hash.clone(),
                date: render_date(row.timestamp),
                address: row.to.clone(),
                amount: row.amount.to_string(),
                confirmations: row.confirmations,
            });

            row.marked = true;
            if let Err(err) = self.store.update_transaction(&row).await {
                tracing::error!(error = %err, id = %row.id, "failed to mark transaction delivered");
            }
        }

        Ok(results)
    }

    #[tracing::instrument(skip(self), err)]
    async fn send_eth(&self, from: String, to: String, amount: String) -> RpcResult<String> {
        let from = normalize_hex_address("from", &from).map_err(rpc_error)?;
        let to = normalize_hex_address("to", &to).map_err(rpc_error)?;
        let amount = parse_amount(&amount).map_err(rpc_error)?;

        let tx_hash = self.chain.send_transfer(&from, &to, &amount).await.map_err(ApiError::from).map_err(rpc_error)?;

        let output = Output { id: self.id_gen.next_id(), hash: tx_hash.clone(), account: from };
        if let Err(err) = self.store.insert_output(output).await {
            tracing::error!(error = %err, hash = %tx_hash, "failed to record output row");
        }

        Ok(tx_hash)
    }

    async fn health(&self) -> RpcResult<bool> {
        Ok(true)
    }
}
