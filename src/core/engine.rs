//! Wallet engine collaborator interfaces
//!
//! The engine performs key derivation, balance computation and account
//! bookkeeping. This crate only drives it through the traits below; every
//! call is a potential blocking point, hence `async`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Public passphrase used when the caller does not supply one.
pub const INSECURE_PUBLIC_PASSPHRASE: &[u8] = b"public";

/// Receiving half of a relock token. The engine re-locks once it fires
/// (or once the sender is dropped).
pub type RelockReceiver = oneshot::Receiver<()>;

/// Errors reported by the wallet engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid passphrase")]
    Passphrase,
    #[error("{0} does not exist")]
    NotExist(String),
    #[error("{0} already exists")]
    Exist(String),
    #[error("wallet is locked")]
    Locked,
    #[error("wallet is not loaded")]
    NotLoaded,
    #[error("operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// Per-account properties as tracked by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProperties {
    pub account_number: u32,
    pub account_name: String,
    pub last_used_external_index: u32,
    pub last_used_internal_index: u32,
    pub imported_key_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountResult {
    pub properties: AccountProperties,
    pub total_balance: u64,
}

/// Snapshot returned by [`WalletEngine::accounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsResult {
    pub accounts: Vec<AccountResult>,
    pub current_block_hash: [u8; 32],
    pub current_block_height: i32,
}

/// Raw balance breakdown, in the chain's smallest unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineBalances {
    pub total: u64,
    pub spendable: u64,
    pub immature_coinbase_rewards: u64,
    pub immature_stake_generation: u64,
    pub locked_by_tickets: u64,
    pub voting_authority: u64,
    pub unconfirmed: u64,
}

/// An open wallet engine instance.
#[async_trait]
pub trait WalletEngine: Send + Sync {
    async fn accounts(&self) -> Result<AccountsResult, EngineError>;

    async fn account_properties(&self, account: u32) -> Result<AccountProperties, EngineError>;

    async fn calculate_account_balance(
        &self,
        account: u32,
        confirmations: u32,
    ) -> Result<EngineBalances, EngineError>;

    /// Unlocks private key material. With a relock token the engine stays
    /// unlocked only until the token fires; without one, until [`lock`](Self::lock).
    async fn unlock(
        &self,
        passphrase: &[u8],
        relock: Option<RelockReceiver>,
    ) -> Result<(), EngineError>;

    async fn lock(&self);

    async fn locked(&self) -> bool;

    /// Derives the next account. Must return promptly once `ctx` is cancelled.
    async fn next_account(&self, ctx: &CancellationToken, name: &str) -> Result<u32, EngineError>;

    async fn rename_account(&self, account: u32, name: &str) -> Result<(), EngineError>;

    async fn account_name(&self, account: u32) -> Result<String, EngineError>;

    async fn account_number(&self, name: &str) -> Result<u32, EngineError>;

    async fn change_private_passphrase(&self, old: &[u8], new: &[u8]) -> Result<(), EngineError>;

    async fn change_public_passphrase(&self, old: &[u8], new: &[u8]) -> Result<(), EngineError>;
}

/// Loads and unloads the engine for one wallet data directory.
#[async_trait]
pub trait WalletLoader: Send + Sync {
    async fn create_new_wallet(
        &self,
        public_passphrase: &[u8],
        private_passphrase: &[u8],
        seed: &[u8],
    ) -> Result<Arc<dyn WalletEngine>, EngineError>;

    async fn open_existing_wallet(
        &self,
        public_passphrase: &[u8],
    ) -> Result<Arc<dyn WalletEngine>, EngineError>;

    async fn unload_wallet(&self) -> Result<(), EngineError>;

    async fn wallet_exists(&self) -> Result<bool, EngineError>;
}

/// Hands out a loader bound to a wallet's data directory.
pub trait LoaderFactory: Send + Sync {
    fn loader_for(&self, data_dir: &Path) -> Arc<dyn WalletLoader>;
}
