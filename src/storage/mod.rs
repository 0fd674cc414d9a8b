//! Wallet metadata persistence
//!
//! A keyed object store for [`WalletRecord`]s with save, delete, lookup by
//! indexed field and a full scan used at startup.

use async_trait::async_trait;

use crate::core::wallet_info::WalletRecord;

mod memory;
mod sqlite;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

/// Record fields the store keeps a unique index on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Name,
    DataDirectory,
}

impl RecordField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::DataDirectory => "data_dir",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate value for unique field: {0}")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.message().to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Inserts or replaces the record with `record.id`.
    async fn save(&self, record: &WalletRecord) -> Result<(), StoreError>;

    /// Removes the record with `record.id`; `NotFound` if there is none.
    async fn delete_record(&self, record: &WalletRecord) -> Result<(), StoreError>;

    /// The record whose `field` equals `value`; `NotFound` if there is none.
    async fn one(&self, field: RecordField, value: &str) -> Result<WalletRecord, StoreError>;

    /// Every record, ordered by id.
    async fn all(&self) -> Result<Vec<WalletRecord>, StoreError>;
}

pub(crate) fn field_value(record: &WalletRecord, field: RecordField) -> String {
    match field {
        RecordField::Name => record.name.clone(),
        RecordField::DataDirectory => record.data_dir.to_string_lossy().into_owned(),
    }
}
