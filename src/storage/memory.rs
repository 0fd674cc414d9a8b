//! In-memory metadata store. Same contract as the SQLite store, no durability.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{field_value, MetadataStore, RecordField, StoreError};
use crate::core::wallet_info::{WalletId, WalletRecord};

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<BTreeMap<WalletId, WalletRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save(&self, record: &WalletRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        for field in [RecordField::Name, RecordField::DataDirectory] {
            let value = field_value(record, field);
            let clash = records
                .values()
                .any(|other| other.id != record.id && field_value(other, field) == value);
            if clash {
                return Err(StoreError::Duplicate(format!("wallets.{}", field.column())));
            }
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_record(&self, record: &WalletRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .remove(&record.id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn one(&self, field: RecordField, value: &str) -> Result<WalletRecord, StoreError> {
        self.records
            .lock()
            .await
            .values()
            .find(|record| field_value(record, field) == value)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn all(&self) -> Result<Vec<WalletRecord>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
