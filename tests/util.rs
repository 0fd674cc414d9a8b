//! Shared helpers for integration tests

use std::path::Path;
use std::sync::Arc;

use multiwallet_core::core::config::{StorageConfig, WalletManagerConfig};
use multiwallet_core::core::wallet_manager::testing::MockLoaderFactory;
use multiwallet_core::storage::{MetadataStore, SqliteMetadataStore};
use multiwallet_core::WalletManager;

/// Config rooted at `root` with a file-backed metadata database under it.
#[allow(dead_code)]
pub fn file_config(root: &Path) -> WalletManagerConfig {
    WalletManagerConfig {
        root_dir: root.to_path_buf(),
        storage: StorageConfig {
            database_url: format!("sqlite://{}/meta/wallets.db?mode=rwc", root.display()),
            max_connections: 2,
        },
    }
}

/// Registry over SQLite plus a handle on the same store for direct lookups.
#[allow(dead_code)]
pub async fn sqlite_manager(
    config: WalletManagerConfig,
    factory: Arc<MockLoaderFactory>,
) -> (WalletManager, Arc<dyn MetadataStore>) {
    let store: Arc<dyn MetadataStore> = Arc::new(
        SqliteMetadataStore::connect(&config.storage)
            .await
            .expect("connect metadata store"),
    );
    let manager = WalletManager::new(config, store.clone(), factory)
        .await
        .expect("build wallet manager");
    (manager, store)
}

/// True when every byte of `buf` has been wiped.
#[allow(dead_code)]
pub fn zeroed(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}
