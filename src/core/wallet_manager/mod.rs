//! Wallet Manager Core Module
//!
//! Owns the `id -> Wallet` registry, the metadata store handle and the
//! registry-wide sync flag.
//!
//! ## Module Structure
//! - `lifecycle` - create, open, rename, delete
//! - `accounts` - default account and discovery flags
//! - `sync` - sync/deletion mutual exclusion
//! - `testing` - mock engine, loader and store for tests (`test-env`)

pub mod accounts;
pub mod lifecycle;
pub mod sync;

// Testing utilities module
#[cfg(any(test, feature = "test-env"))]
pub mod testing;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::config::WalletManagerConfig;
use crate::core::engine::LoaderFactory;
use crate::core::errors::WalletError;
use crate::core::wallet::Wallet;
use crate::core::wallet_info::{WalletId, WalletRecord};
use crate::storage::{MetadataStore, SqliteMetadataStore};

pub use sync::{SyncFlag, SyncGuard};

/// wallet manager
///
/// Constructed once at startup and shut down explicitly; every wallet
/// operation goes through an instance of this type.
pub struct WalletManager {
    config: WalletManagerConfig,

    /// Persistent wallet records
    store: Arc<dyn MetadataStore>,

    /// Engine loaders, one per data directory
    loaders: Arc<dyn LoaderFactory>,

    /// id -> controller; never held across an await
    wallets: RwLock<BTreeMap<WalletId, Arc<Wallet>>>,

    sync: SyncFlag,

    /// Parent of every wallet's shutdown token
    shutdown: CancellationToken,

    /// Serializes record mutations so check-then-persist sequences do not interleave
    mutations: tokio::sync::Mutex<()>,

    next_id: AtomicI64,
}

impl WalletManager {
    /// Builds the registry and loads every stored record. Loaded wallets
    /// start closed.
    pub async fn new(
        config: WalletManagerConfig,
        store: Arc<dyn MetadataStore>,
        loaders: Arc<dyn LoaderFactory>,
    ) -> Result<Self, WalletError> {
        let shutdown = CancellationToken::new();
        let records = store.all().await?;

        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let wallets = records
            .into_iter()
            .map(|record| {
                let loader = loaders.loader_for(&record.data_dir);
                let id = record.id;
                (id, Arc::new(Wallet::existing(record, loader, shutdown.child_token())))
            })
            .collect::<BTreeMap<_, _>>();

        info!(wallets = wallets.len(), "Wallet manager loaded");

        Ok(Self {
            config,
            store,
            loaders,
            wallets: RwLock::new(wallets),
            sync: SyncFlag::new(),
            shutdown,
            mutations: tokio::sync::Mutex::new(()),
            next_id: AtomicI64::new(next_id),
        })
    }

    /// [`new`](Self::new) backed by the SQLite store named in `config.storage`.
    pub async fn with_sqlite_store(
        config: WalletManagerConfig,
        loaders: Arc<dyn LoaderFactory>,
    ) -> Result<Self, WalletError> {
        let store = SqliteMetadataStore::connect(&config.storage).await?;
        Self::new(config, Arc::new(store), loaders).await
    }

    pub fn config(&self) -> &WalletManagerConfig {
        &self.config
    }

    /// # Errors
    /// * `WalletError::NotExist` - If no wallet has this id
    pub fn wallet(&self, id: WalletId) -> Result<Arc<Wallet>, WalletError> {
        self.wallets.read().get(&id).cloned().ok_or(WalletError::NotExist)
    }

    pub fn wallet_with_name(&self, name: &str) -> Option<Arc<Wallet>> {
        self.wallets.read().values().find(|w| w.name() == name).cloned()
    }

    pub fn wallet_ids(&self) -> Vec<WalletId> {
        self.wallets.read().keys().copied().collect()
    }

    /// Record snapshots ordered by id.
    pub fn list_wallets(&self) -> Vec<WalletRecord> {
        self.wallets.read().values().map(|w| w.record()).collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.read().len()
    }

    /// Marks a sync as running until the returned guard is dropped.
    pub fn begin_sync(&self) -> Result<SyncGuard, WalletError> {
        self.sync.try_begin_sync()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    /// Registry shutdown token; every wallet's token is a child of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancels all background work and closes every open wallet.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let wallets: Vec<Arc<Wallet>> = self.wallets.read().values().cloned().collect();
        for wallet in wallets {
            if let Err(e) = wallet.close().await {
                warn!(wallet_id = wallet.id(), "Failed to close wallet on shutdown: {}", e);
            }
        }
        info!("Wallet manager shut down");
    }

    fn allocate_id(&self) -> WalletId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn register(&self, wallet: Arc<Wallet>) {
        self.wallets.write().insert(wallet.id(), wallet);
    }

    fn unregister(&self, id: WalletId) {
        self.wallets.write().remove(&id);
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("wallets", &self.wallet_ids())
            .field("syncing", &self.is_syncing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wallet::WalletState;
    use crate::core::wallet_info::PassphraseType;
    use crate::storage::MemoryMetadataStore;
    use super::testing::{seed_existing_wallet, MockLoaderFactory};

    #[tokio::test]
    async fn test_new_loads_stored_records_closed() {
        let root = tempfile::tempdir().unwrap();
        let config = WalletManagerConfig::in_memory(root.path());
        let factory = Arc::new(MockLoaderFactory::new());
        let store = Arc::new(MemoryMetadataStore::new());

        for (id, name) in [(3, "cold"), (7, "hot")] {
            let dir = config.wallet_data_dir(id);
            seed_existing_wallet(&factory, &dir, b"spend");
            store.save(&WalletRecord::new(id, name, dir, PassphraseType::Pin)).await.unwrap();
        }

        let manager = WalletManager::new(config, store, factory).await.unwrap();
        assert_eq!(manager.wallet_ids(), vec![3, 7]);
        assert_eq!(manager.wallet_count(), 2);
        assert_eq!(manager.wallet_with_name("hot").unwrap().id(), 7);
        assert_eq!(manager.wallet(3).unwrap().state().await, WalletState::Closed);
        assert_eq!(manager.allocate_id(), 8);
        assert_eq!(manager.wallet(4).unwrap_err(), WalletError::NotExist);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_closes() {
        let root = tempfile::tempdir().unwrap();
        let config = WalletManagerConfig::in_memory(root.path());
        let factory = Arc::new(MockLoaderFactory::new());
        let store = Arc::new(MemoryMetadataStore::new());
        let dir = config.wallet_data_dir(1);
        seed_existing_wallet(&factory, &dir, b"spend");
        store.save(&WalletRecord::new(1, "only", dir, PassphraseType::Pin)).await.unwrap();

        let manager = WalletManager::new(config, store, factory).await.unwrap();
        let wallet = manager.open_wallet(1, &mut Vec::new()).await.unwrap();
        let token = wallet.shutdown_token();

        manager.shutdown().await;
        assert!(token.is_cancelled());
        assert!(!wallet.opened());
    }
}
