use thiserror::Error;

/// Errors surfaced by a [`crate::chain::ChainClient`] implementation.
///
/// All variants are treated as transient by the core loops: they are logged
/// and the calling loop retries on its own schedule (see `spec.md` §7).
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to fetch chain head: {0}")]
    Head(String),
    #[error("failed to fetch block {0}: {1}")]
    Block(u64, String),
    #[error("failed to fetch receipt for {0}: {1}")]
    Receipt(String, String),
    #[error("failed to fetch balance for {0}: {1}")]
    Balance(String, String),
    #[error("failed to fetch local accounts: {0}")]
    Accounts(String),
    #[error("failed to recover sender for transaction {0}: {1}")]
    SenderRecovery(String, String),
    #[error("failed to submit transfer: {0}")]
    SendTransfer(String),
}

/// Errors surfaced by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("setting lookup failed: {0}")]
    Setting(String),
    #[error("atomic transaction insert failed: {0}")]
    Insert(String),
    #[error("transaction select failed: {0}")]
    Select(String),
    #[error("transaction update failed: {0}")]
    Update(String),
    #[error("account lookup failed: {0}")]
    AccountLookup(String),
    #[error("account upsert failed: {0}")]
    AccountUpsert(String),
    #[error("output insert failed: {0}")]
    OutputInsert(String),
}

/// Fatal errors that can abort startup. Per `spec.md` §7, these are the only
/// errors that ever propagate out of [`crate::indexer::Supervisor::start`].
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not fetch the initial chain head: {0}")]
    InitialHead(#[from] ChainError),
    #[error("could not read the persisted cursor: {0}")]
    InitialCursor(#[from] StoreError),
}

/// Errors returned to JSON-RPC callers.
///
/// Input-validation failures are descriptive (`spec.md` §7 taxonomy item 4);
/// backend failures are opaque so that internal details never leak to a
/// caller, matching `src/providers/eth_provider/error.rs`'s approach of
/// mapping every internal error variant to a stable JSON-RPC error code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid \"{field}\" argument: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("backend request failed")]
    Backend,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store error while serving API request");
        Self::Backend
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        tracing::error!(error = %err, "chain client error while serving API request");
        Self::Backend
    }
}
