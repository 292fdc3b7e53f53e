//! JSON-RPC HTTP façade over the indexer's read API (`spec.md` §6),
//! grounded on `src/eth_rpc/mod.rs`'s `run_server`.

pub mod api;
pub mod server;

use std::net::SocketAddr;

use eyre::Result;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::chain::ChainClient;
use crate::rpc::api::IndexerApiServer;
use crate::rpc::server::IndexerRpc;
use crate::store::{IdGenerator, Store};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Jsonrpsee(#[from] jsonrpsee::core::Error),
}

/// Builds and starts the JSON-RPC server at `listen_addr`. Returns the
/// bound address and a handle the caller can `.stop()` on shutdown.
pub async fn run_server<C, S, I>(
    chain: std::sync::Arc<C>,
    store: std::sync::Arc<S>,
    id_gen: std::sync::Arc<I>,
    listen_addr: SocketAddr,
) -> Result<(SocketAddr, ServerHandle), RpcError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
    I: IdGenerator + 'static,
{
    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);
    let http_middleware = tower::ServiceBuilder::new().layer(cors);

    let server = ServerBuilder::default()
        .max_connections(100)
        .set_http_middleware(http_middleware)
        .build(listen_addr)
        .await?;

    let addr = server.local_addr()?;
    let rpc_impl = IndexerRpc::new(chain, store, id_gen);
    let handle = server.start(rpc_impl.into_rpc());

    Ok((addr, handle))
}
