use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::FromRow;
use tracing::{debug, info, warn};

use super::{field_value, MetadataStore, RecordField, StoreError};
use crate::core::config::StorageConfig;
use crate::core::wallet_info::{PassphraseType, WalletRecord};

#[derive(Debug)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    is_memory: bool,
}

#[derive(Debug, FromRow)]
struct WalletRow {
    id: i64,
    name: String,
    data_dir: String,
    default_account: i64,
    spending_passphrase_type: i64,
    discovered_accounts: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for WalletRecord {
    type Error = StoreError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        let default_account = u32::try_from(row.default_account)
            .map_err(|_| StoreError::Corrupt(format!("wallet {} default_account", row.id)))?;
        let spending_passphrase_type = PassphraseType::from_i64(row.spending_passphrase_type)
            .ok_or_else(|| StoreError::Corrupt(format!("wallet {} passphrase type", row.id)))?;

        Ok(WalletRecord {
            id: row.id,
            name: row.name,
            data_dir: PathBuf::from(row.data_dir),
            default_account,
            spending_passphrase_type,
            discovered_accounts: row.discovered_accounts,
            created_at: row.created_at,
        })
    }
}

/// Accepts `sqlite:` or `sqlite://` and creates the parent directory of a
/// file-backed database.
fn normalize_url(database_url: &str) -> String {
    let mut db_url = database_url.to_string();
    if db_url.starts_with("sqlite:") && !db_url.starts_with("sqlite://") {
        db_url = db_url.replacen("sqlite:", "sqlite://", 1);
    }

    if let Some(path) = db_url.strip_prefix("sqlite://") {
        let path_only = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        if path_only != ":memory:" && !path_only.is_empty() {
            if let Some(parent) = std::path::Path::new(path_only).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!("Failed to create database dir {:?}: {}", parent, e);
                    }
                }
            }
        }
    }
    db_url
}

impl SqliteMetadataStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let db_url = normalize_url(&config.database_url);
        let is_memory = db_url.contains(":memory:");

        // Avoid logging the full URL; it may carry credentials.
        let safe_db_url_info = match db_url.split_once("://") {
            Some((scheme, rest)) => format!("{}://(redacted, len={})", scheme, rest.len()),
            None => "(invalid db_url format)".to_string(),
        };
        info!(db = %safe_db_url_info, "[storage] connecting to database");

        let mut connect_options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !is_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database, so pin exactly one.
        let pool_options = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options.connect_with(connect_options).await?;

        let store = Self { pool, is_memory };
        store.initialize_schema().await?;

        info!("Wallet metadata store initialized");
        Ok(store)
    }

    pub fn is_in_memory(&self) -> bool {
        self.is_memory
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        debug!("Initializing metadata schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                data_dir TEXT UNIQUE NOT NULL,
                default_account INTEGER NOT NULL DEFAULT 0,
                spending_passphrase_type INTEGER NOT NULL,
                discovered_accounts BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn save(&self, record: &WalletRecord) -> Result<(), StoreError> {
        debug!(wallet_id = record.id, "Saving wallet record");

        sqlx::query(
            r#"
            INSERT INTO wallets (id, name, data_dir, default_account,
                                 spending_passphrase_type, discovered_accounts, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                data_dir = excluded.data_dir,
                default_account = excluded.default_account,
                spending_passphrase_type = excluded.spending_passphrase_type,
                discovered_accounts = excluded.discovered_accounts
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(field_value(record, RecordField::DataDirectory))
        .bind(i64::from(record.default_account))
        .bind(record.spending_passphrase_type.as_i64())
        .bind(record.discovered_accounts)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_record(&self, record: &WalletRecord) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM wallets WHERE id = ?1")
            .bind(record.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(wallet_id = record.id, "Deleted wallet record");
        Ok(())
    }

    async fn one(&self, field: RecordField, value: &str) -> Result<WalletRecord, StoreError> {
        // Column names come from a closed enum, never from callers.
        let sql = format!("SELECT * FROM wallets WHERE {} = ?1", field.column());
        let row: WalletRow = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        row.try_into()
    }

    async fn all(&self) -> Result<Vec<WalletRecord>, StoreError> {
        let rows: Vec<WalletRow> = sqlx::query_as("SELECT * FROM wallets ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(WalletRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn memory_config() -> StorageConfig {
        StorageConfig { database_url: "sqlite::memory:".to_string(), max_connections: 1 }
    }

    fn record(id: i64, name: &str) -> WalletRecord {
        WalletRecord::new(id, name, format!("/tmp/wallets/{}", id), PassphraseType::Password)
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("sqlite::memory:"), "sqlite://:memory:");
        assert_eq!(normalize_url("sqlite://:memory:"), "sqlite://:memory:");
    }

    #[tokio::test]
    async fn test_save_one_all() {
        let store = SqliteMetadataStore::connect(&memory_config()).await.unwrap();
        assert!(store.is_in_memory());

        let mut main = record(1, "main");
        main.default_account = 3;
        main.discovered_accounts = true;
        store.save(&main).await.unwrap();
        store.save(&record(2, "spare")).await.unwrap();

        let loaded = store.one(RecordField::Name, "main").await.unwrap();
        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.default_account, 3);
        assert!(loaded.discovered_accounts);
        assert_eq!(loaded.spending_passphrase_type, PassphraseType::Password);

        let by_dir = store.one(RecordField::DataDirectory, "/tmp/wallets/2").await.unwrap();
        assert_eq!(by_dir.name, "spare");

        let ids: Vec<i64> = store.all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let store = SqliteMetadataStore::connect(&memory_config()).await.unwrap();
        store.save(&record(1, "main")).await.unwrap();

        let mut renamed = record(1, "renamed");
        renamed.default_account = 7;
        store.save(&renamed).await.unwrap();

        assert_eq!(store.one(RecordField::Name, "main").await, Err(StoreError::NotFound));
        assert_eq!(store.one(RecordField::Name, "renamed").await.unwrap().default_account, 7);
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_name_enforced() {
        let store = SqliteMetadataStore::connect(&memory_config()).await.unwrap();
        store.save(&record(1, "main")).await.unwrap();

        let err = store.save(&record(2, "main")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = SqliteMetadataStore::connect(&memory_config()).await.unwrap();
        let main = record(1, "main");
        store.save(&main).await.unwrap();

        store.delete_record(&main).await.unwrap();
        assert_eq!(store.delete_record(&main).await, Err(StoreError::NotFound));
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/meta/wallets.db?mode=rwc", dir.path().display());
        let config = StorageConfig { database_url: url, max_connections: 2 };

        {
            let store = SqliteMetadataStore::connect(&config).await.unwrap();
            assert!(!store.is_in_memory());
            store.save(&record(4, "durable")).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteMetadataStore::connect(&config).await.unwrap();
        assert_eq!(reopened.one(RecordField::Name, "durable").await.unwrap().id, 4);
    }
}
