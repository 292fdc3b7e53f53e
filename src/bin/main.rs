//! Wires the indexing core to a real chain node and a MongoDB store,
//! grounded on `crates/eth-rpc/src/main.rs`'s startup sequence: load
//! environment, build collaborators, launch, wait for shutdown.

use std::sync::Arc;

use eyre::Result;
use tracing_subscriber::util::SubscriberInitExt;

use chain_indexer::chain::rpc_client::RpcChainClient;
use chain_indexer::config::Config;
use chain_indexer::indexer::Supervisor;
use chain_indexer::rpc;
use chain_indexer::store::mongo::MongoStore;
use chain_indexer::store::UuidGenerator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::FmtSubscriber::builder().with_env_filter(filter).finish().try_init()?;

    let config = Config::from_env()?;

    let chain = Arc::new(RpcChainClient::connect(&config.chain_rpc_url)?);
    let store = Arc::new(MongoStore::connect(&config.database_url, &config.database_name).await?);
    let id_gen = Arc::new(UuidGenerator);

    let supervisor = Supervisor::start(Arc::clone(&chain), Arc::clone(&store), Arc::clone(&id_gen), &config).await?;

    let (addr, handle) = rpc::run_server(chain, store, id_gen, config.rpc_listen_addr).await?;
    tracing::info!(%addr, "JSON-RPC server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    handle.stop().ok();
    handle.stopped().await;
    supervisor.close().await;

    Ok(())
}
