use crate::core::engine::EngineError;
use crate::storage::StoreError;

/// Caller-facing error taxonomy for wallet and registry operations.
///
/// Collaborator errors (`EngineError`, `StoreError`) never cross the
/// controller/registry boundary; they are translated through the `From`
/// impls below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The supplied passphrase was rejected by the wallet engine.
    #[error("Invalid passphrase")]
    InvalidPassphrase,
    /// Wallet creation was attempted without a seed mnemonic.
    #[error("Seed mnemonic is empty")]
    EmptySeed,
    /// The seed mnemonic could not be decoded.
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),
    /// The operation needs an open engine handle and there is none.
    #[error("Wallet has not been loaded")]
    WalletNotLoaded,
    /// No wallet with the requested id is registered.
    #[error("Wallet does not exist")]
    NotExist,
    /// A wallet (or account) with the requested name already exists.
    #[error("Already exists")]
    Exist,
    /// A sync is running, so the registry refuses to delete wallets.
    #[error("Sync already in progress")]
    SyncAlreadyInProgress,
    /// A wallet deletion is running, so a sync cannot start.
    #[error("Wallet deletion in progress")]
    Busy,
    /// User-chosen wallet names must not use the reserved prefix.
    #[error("'{0}' is a reserved prefix")]
    ReservedName(String),
    /// Shutdown was requested while the operation was running.
    #[error("Operation cancelled by shutdown")]
    Cancelled,
    /// Engine-reported error with no dedicated kind.
    #[error("{0}")]
    Translated(String),
    /// Metadata store failure.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Filesystem failure while touching a wallet data directory.
    #[error("IO error: {0}")]
    Io(String),
}

impl WalletError {
    /// Stable machine-readable code for binding layers.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidPassphrase => "invalid_passphrase",
            WalletError::EmptySeed => "empty_seed",
            WalletError::InvalidSeed(_) => "invalid_seed",
            WalletError::WalletNotLoaded => "wallet_not_loaded",
            WalletError::NotExist => "not_exists",
            WalletError::Exist => "exists",
            WalletError::SyncAlreadyInProgress => "sync_already_in_progress",
            WalletError::Busy => "busy",
            WalletError::ReservedName(_) => "reserved_name",
            WalletError::Cancelled => "cancelled",
            WalletError::Translated(_) => "translated",
            WalletError::Storage(_) => "storage",
            WalletError::Io(_) => "io",
        }
    }

    /// True when retrying the same call later may succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::SyncAlreadyInProgress
                | WalletError::Busy
                | WalletError::Storage(_)
                | WalletError::Io(_)
        )
    }
}

impl From<EngineError> for WalletError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Passphrase => WalletError::InvalidPassphrase,
            EngineError::NotLoaded => WalletError::WalletNotLoaded,
            EngineError::Exist(_) => WalletError::Exist,
            EngineError::Cancelled => WalletError::Cancelled,
            other @ (EngineError::NotExist(_) | EngineError::Locked | EngineError::Other(_)) => {
                WalletError::Translated(other.to_string())
            }
        }
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => WalletError::NotExist,
            StoreError::Duplicate(_) => WalletError::Exist,
            other => WalletError::Storage(other.to_string()),
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Io(err.to_string())
    }
}
