use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::wallet_info::WalletId;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Metadata database URL (`sqlite:` scheme)
    #[serde(default = "StorageConfig::default_database_url")]
    pub database_url: String,

    /// Connection pool size (ignored for in-memory databases)
    #[serde(default = "StorageConfig::default_max_connections")]
    pub max_connections: u32,
}

impl StorageConfig {
    fn default_database_url() -> String {
        "sqlite://./data/wallets.db?mode=rwc".to_string()
    }
    fn default_max_connections() -> u32 { 5 }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: Self::default_database_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

/// wallet manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletManagerConfig {
    /// Root under which every wallet gets `wallets/<id>`
    #[serde(default = "WalletManagerConfig::default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl WalletManagerConfig {
    fn default_root_dir() -> PathBuf {
        PathBuf::from("./data")
    }

    /// Config rooted at `root_dir` with an in-memory metadata database.
    pub fn in_memory(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            storage: StorageConfig {
                database_url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse wallet manager config")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Data directory owned by wallet `id`.
    pub fn wallet_data_dir(&self, id: WalletId) -> PathBuf {
        self.root_dir.join("wallets").join(id.to_string())
    }
}

impl Default for WalletManagerConfig {
    fn default() -> Self {
        Self {
            root_dir: Self::default_root_dir(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let cfg = WalletManagerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("./data"));
        assert_eq!(cfg.storage.max_connections, 5);
        assert!(cfg.storage.database_url.starts_with("sqlite://"));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let cfg = WalletManagerConfig::from_toml_str(
            r#"
            root_dir = "/var/lib/wallets"

            [storage]
            database_url = "sqlite::memory:"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("/var/lib/wallets"));
        assert_eq!(cfg.storage.database_url, "sqlite::memory:");
        assert_eq!(cfg.storage.max_connections, 5);
    }

    #[test]
    fn test_wallet_data_dir_layout() {
        let cfg = WalletManagerConfig::in_memory("/tmp/root");
        assert_eq!(cfg.wallet_data_dir(7), PathBuf::from("/tmp/root/wallets/7"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(WalletManagerConfig::from_toml_str("root_dir = [").is_err());
    }
}
