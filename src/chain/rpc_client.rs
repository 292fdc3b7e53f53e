//! A minimal Ethereum JSON-RPC [`ChainClient`], grounded on
//! `original_source/eth/client.go`'s use of `personal_listAccounts` for the
//! watched-account set and `eth_sendTransaction` for outbound transfers.
//! Kept intentionally thin: the concrete chain-node client is an external
//! collaborator per `spec.md` §1, this exists so the binary is runnable
//! end to end rather than as a subject of the core's own test suite.

use std::collections::HashSet;
use std::str::FromStr;

use alloy_primitives::U256;
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde_json::Value;

use super::{Block, ChainClient, Receipt, ReceiptStatus, SyncProgress, Transaction};
use crate::error::ChainError;

/// Fixed gas limit for outbound transfers, matching
/// `original_source/eth/client.go`'s `gas = hexutil.EncodeUint64(30400)`.
const TRANSFER_GAS: &str = "0x76c0";

pub struct RpcChainClient {
    client: HttpClient,
}

impl RpcChainClient {
    pub fn connect(url: &str) -> Result<Self, ChainError> {
        let client = HttpClientBuilder::default().build(url).map_err(|e| ChainError::Head(e.to_string()))?;
        Ok(Self { client })
    }

    async fn call(&self, method: &str, params: jsonrpsee::core::params::ArrayParams) -> Result<Value, String> {
        self.client.request(method, params).await.map_err(|e| e.to_string())
    }
}

fn hex_to_u64(raw: &str) -> Result<u64, String> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn hex_to_u256(raw: &str) -> Result<U256, String> {
    U256::from_str(raw).map_err(|e| e.to_string())
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn head(&self) -> Result<u64, ChainError> {
        let raw = self.call("eth_blockNumber", rpc_params![]).await.map_err(ChainError::Head)?;
        let raw = raw.as_str().ok_or_else(|| ChainError::Head("non-string response".to_string()))?;
        hex_to_u64(raw).map_err(ChainError::Head)
    }

    async fn block_at(&self, number: u64) -> Result<Block, ChainError> {
        let tag = format!("0x{number:x}");
        let raw = self
            .call("eth_getBlockByNumber", rpc_params![tag, true])
            .await
            .map_err(|e| ChainError::Block(number, e))?;

        if raw.is_null() {
            return Err(ChainError::Block(number, "block not found".to_string()));
        }

        let timestamp = str_field(&raw, "timestamp")
            .and_then(|raw| hex_to_u64(&raw).ok())
            .ok_or_else(|| ChainError::Block(number, "missing timestamp".to_string()))?;

        let transactions = raw
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| ChainError::Block(number, "missing transactions array".to_string()))?
            .iter()
            .filter_map(|tx| {
                let hash = str_field(tx, "hash")?;
                let value = str_field(tx, "value").and_then(|v| hex_to_u256(&v).ok()).unwrap_or_default();
                let to = str_field(tx, "to");
                Some(Transaction { hash, value, to })
            })
            .collect();

        Ok(Block { number, timestamp, transactions })
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Receipt, ChainError> {
        let raw = self
            .call("eth_getTransactionReceipt", rpc_params![tx_hash])
            .await
            .map_err(|e| ChainError::Receipt(tx_hash.to_string(), e))?;

        if raw.is_null() {
            return Err(ChainError::Receipt(tx_hash.to_string(), "receipt not found".to_string()));
        }

        let status = match str_field(&raw, "status").as_deref() {
            Some("0x1") => ReceiptStatus::Successful,
            Some("0x0") => ReceiptStatus::Failed,
            _ => ReceiptStatus::Other,
        };
        let contract_address = str_field(&raw, "contractAddress");

        Ok(Receipt { status, contract_address })
    }

    async fn balance_at(&self, address: &str, block: u64) -> Result<U256, ChainError> {
        let tag = format!("0x{block:x}");
        let raw = self
            .call("eth_getBalance", rpc_params![address, tag])
            .await
            .map_err(|e| ChainError::Balance(address.to_string(), e))?;
        let raw = raw.as_str().ok_or_else(|| ChainError::Balance(address.to_string(), "non-string response".to_string()))?;
        hex_to_u256(raw).map_err(|e| ChainError::Balance(address.to_string(), e))
    }

    async fn accounts(&self) -> Result<HashSet<String>, ChainError> {
        let raw = self.call("personal_listAccounts", rpc_params![]).await.map_err(ChainError::Accounts)?;
        let accounts = raw
            .as_array()
            .ok_or_else(|| ChainError::Accounts("non-array response".to_string()))?
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_lowercase()))
            .collect();
        Ok(accounts)
    }

    async fn send_transfer(&self, from: &str, to: &str, amount: &U256) -> Result<String, ChainError> {
        let gas_price = self
            .call("eth_gasPrice", rpc_params![])
            .await
            .map_err(ChainError::SendTransfer)?
            .as_str()
            .ok_or_else(|| ChainError::SendTransfer("non-string gas price".to_string()))?
            .to_string();

        let args = serde_json::json!({
            "from": from,
            "to": to,
            "gas": TRANSFER_GAS,
            "gasPrice": gas_price,
            "value": format!("0x{amount:x}"),
        });

        let raw = self.call("eth_sendTransaction", rpc_params![args]).await.map_err(ChainError::SendTransfer)?;
        raw.as_str().map(str::to_string).ok_or_else(|| ChainError::SendTransfer("non-string tx hash".to_string()))
    }

    async fn recover_sender(&self, tx: &Transaction) -> Result<String, ChainError> {
        let raw = self
            .call("eth_getTransactionByHash", rpc_params![&tx.hash])
            .await
            .map_err(|e| ChainError::SenderRecovery(tx.hash.clone(), e))?;
        str_field(&raw, "from")
            .map(|s| s.to_lowercase())
            .ok_or_else(|| ChainError::SenderRecovery(tx.hash.clone(), "node did not report a sender".to_string()))
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, ChainError> {
        let raw = self.call("eth_syncing", rpc_params![]).await.map_err(ChainError::Head)?;
        if raw.as_bool() == Some(false) {
            return Ok(None);
        }
        let current = str_field(&raw, "currentBlock").and_then(|s| hex_to_u64(&s).ok()).unwrap_or(0);
        let highest = str_field(&raw, "highestBlock").and_then(|s| hex_to_u64(&s).ok()).unwrap_or(0);
        Ok(Some(SyncProgress { current_block: current, highest_block: highest }))
    }
}
