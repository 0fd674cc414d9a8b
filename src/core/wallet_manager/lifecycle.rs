//! Wallet lifecycle management
//!
//! Registry-level create, open, rename and delete. Records are persisted
//! before the in-memory registry changes.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{error, info, warn};

use super::WalletManager;
use crate::core::errors::WalletError;
use crate::core::wallet::{seed, Wallet};
use crate::core::wallet_info::{PassphraseType, WalletId, WalletRecord, RESERVED_NAME_PREFIX};
use crate::security::{ScopedPassphrase, SecretVec};
use crate::storage::{RecordField, StoreError};

impl WalletManager {
    /// Creates, persists and registers a new wallet.
    ///
    /// Without `name` the wallet is called `wallet-<id>`. The passphrase
    /// buffer is zeroed before returning.
    ///
    /// # Errors
    /// * `WalletError::ReservedName` - If `name` starts with `wallet-`
    /// * `WalletError::Exist` - If another wallet already uses `name`
    /// * `WalletError::EmptySeed` / `WalletError::InvalidSeed` - If the mnemonic is unusable
    pub async fn create_wallet(
        &self,
        name: Option<&str>,
        passphrase: &mut [u8],
        passphrase_type: PassphraseType,
        seed_mnemonic: &str,
    ) -> Result<Arc<Wallet>, WalletError> {
        let mut passphrase = ScopedPassphrase::new(passphrase);

        let _mutations = self.mutations.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(WalletError::Cancelled);
        }
        if let Some(name) = name {
            self.check_name_available(None, name).await?;
        }

        let id = self.allocate_id();
        let name = name.map_or_else(|| format!("{}{}", RESERVED_NAME_PREFIX, id), str::to_string);
        let data_dir = self.config.wallet_data_dir(id);
        let record = WalletRecord::new(id, name, &data_dir, passphrase_type);

        let wallet = Arc::new(Wallet::new(
            record.clone(),
            self.loaders.loader_for(&data_dir),
            self.shutdown.child_token(),
        ));
        wallet.create(&mut passphrase, seed_mnemonic).await?;

        if let Err(e) = self.store.save(&record).await {
            error!(wallet_id = id, "Failed to persist new wallet: {}", e);
            wallet.discard().await;
            return Err(e.into());
        }
        self.register(wallet.clone());

        info!(wallet_id = id, name = %record.name, "Wallet created");
        Ok(wallet)
    }

    /// A fresh 24-word mnemonic for [`create_wallet`](Self::create_wallet).
    pub fn generate_seed(&self) -> Result<SecretString, WalletError> {
        seed::generate_seed()
    }

    /// Opens wallet `id`. An empty public passphrase means the insecure default.
    pub async fn open_wallet(
        &self,
        id: WalletId,
        public_passphrase: &mut [u8],
    ) -> Result<Arc<Wallet>, WalletError> {
        let public_passphrase = ScopedPassphrase::new(public_passphrase);
        let wallet = self.wallet(id)?;
        wallet.open(&mut SecretVec::new(public_passphrase.to_vec())).await?;
        Ok(wallet)
    }

    /// Opens every registered wallet with the same public passphrase,
    /// stopping at the first failure.
    pub async fn open_wallets(&self, public_passphrase: &mut [u8]) -> Result<(), WalletError> {
        let public_passphrase = ScopedPassphrase::new(public_passphrase);
        let wallets: Vec<Arc<Wallet>> = self.wallets.read().values().cloned().collect();

        for wallet in wallets {
            wallet
                .open(&mut SecretVec::new(public_passphrase.to_vec()))
                .await
                .map_err(|e| {
                    error!(wallet_id = wallet.id(), "Failed to open wallet: {}", e);
                    e
                })?;
        }
        Ok(())
    }

    /// Renames wallet `id`. Renaming a wallet to its current name succeeds.
    ///
    /// # Errors
    /// * `WalletError::ReservedName` - If `new_name` starts with `wallet-`
    /// * `WalletError::NotExist` - If no wallet has this id
    /// * `WalletError::Exist` - If a different wallet already uses `new_name`
    pub async fn rename_wallet(&self, id: WalletId, new_name: &str) -> Result<(), WalletError> {
        let _mutations = self.mutations.lock().await;
        check_reserved_prefix(new_name)?;
        let wallet = self.wallet(id)?;
        self.check_name_unused(Some(id), new_name).await?;

        let mut record = wallet.record();
        let old_name = std::mem::replace(&mut record.name, new_name.to_string());
        self.store.save(&record).await?;
        wallet.set_record(record);

        info!(wallet_id = id, old_name = %old_name, new_name = %new_name, "Wallet renamed");
        Ok(())
    }

    /// Deletes wallet `id` from disk, the store and the registry.
    ///
    /// Refused while a sync runs. The wallet must be open and `passphrase`
    /// must unlock it; nothing is removed otherwise. If the store removal
    /// fails after the directory is gone, the wallet stays registered and a
    /// retry finishes the job. That retry does not check `passphrase`: the
    /// engine is already unloaded and its data removed, so only the record is
    /// left to drop.
    ///
    /// # Errors
    /// * `WalletError::SyncAlreadyInProgress` - If a sync holds the flag
    /// * `WalletError::Busy` - If another deletion is running
    /// * `WalletError::NotExist` - If no wallet has this id
    pub async fn delete_wallet(&self, id: WalletId, passphrase: &mut [u8]) -> Result<(), WalletError> {
        let mut passphrase = ScopedPassphrase::new(passphrase);
        let _deleting = self.sync.try_begin_deletion().map_err(|e| {
            warn!(wallet_id = id, "Refusing to delete wallet: {}", e);
            e
        })?;

        let _mutations = self.mutations.lock().await;
        let wallet = self.wallet(id)?;
        wallet.delete(&mut passphrase).await?;

        match self.store.delete_record(&wallet.record()).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => {
                error!(wallet_id = id, "Wallet removed from disk but not from store: {}", e);
                return Err(e.into());
            }
        }
        self.unregister(id);

        info!(wallet_id = id, "Wallet deleted");
        Ok(())
    }

    /// Rejects reserved names and names used by a wallet other than `owner`.
    async fn check_name_available(&self, owner: Option<WalletId>, name: &str) -> Result<(), WalletError> {
        check_reserved_prefix(name)?;
        self.check_name_unused(owner, name).await
    }

    /// A store hit on `owner` itself is not a conflict.
    async fn check_name_unused(&self, owner: Option<WalletId>, name: &str) -> Result<(), WalletError> {
        match self.store.one(RecordField::Name, name).await {
            Ok(existing) if Some(existing.id) == owner => Ok(()),
            Ok(_) => Err(WalletError::Exist),
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_reserved_prefix(name: &str) -> Result<(), WalletError> {
    if name.starts_with(RESERVED_NAME_PREFIX) {
        return Err(WalletError::ReservedName(RESERVED_NAME_PREFIX.to_string()));
    }
    Ok(())
}
