//! Wallet lifecycle management
//!
//! Provides wallet creation, opening, closing and deletion

use std::path::Path;

use tracing::{error, info, warn};

use super::seed::decode_seed;
use super::{EngineSlot, Wallet};
use crate::core::engine::INSECURE_PUBLIC_PASSPHRASE;
use crate::core::errors::WalletError;
use crate::security::ScopedPassphrase;

impl Wallet {
    /// Materializes a new wallet from `seed_mnemonic`, protected by `passphrase`.
    ///
    /// The passphrase buffer is zeroed before returning.
    ///
    /// # Errors
    /// * `WalletError::EmptySeed` - If the mnemonic is empty (nothing is created)
    /// * `WalletError::InvalidSeed` - If the mnemonic cannot be decoded
    /// * `WalletError::Exist` - If the wallet was already created
    pub async fn create(&self, passphrase: &mut [u8], seed_mnemonic: &str) -> Result<(), WalletError> {
        let passphrase = ScopedPassphrase::new(passphrase);
        let wallet_id = self.id();
        info!(wallet_id, "Creating wallet");

        if seed_mnemonic.trim().is_empty() {
            return Err(WalletError::EmptySeed);
        }
        let seed = decode_seed(seed_mnemonic).map_err(|e| {
            error!(wallet_id, "Failed to decode seed: {}", e);
            e
        })?;

        let _transition = self.transition.lock().await;
        match &*self.slot.read() {
            EngineSlot::Uninitialized => {}
            EngineSlot::Deleted => return Err(WalletError::NotExist),
            EngineSlot::Open(_) | EngineSlot::Closed => return Err(WalletError::Exist),
        }

        let engine = self
            .loader
            .create_new_wallet(INSECURE_PUBLIC_PASSPHRASE, &passphrase, &seed)
            .await
            .map_err(|e| {
                error!(wallet_id, "Engine failed to create wallet: {}", e);
                WalletError::from(e)
            })?;
        *self.slot.write() = EngineSlot::Open(engine);

        info!(wallet_id, "Created wallet");
        Ok(())
    }

    /// Loads the existing on-disk wallet. An empty public passphrase means the
    /// insecure default. No-op when already open.
    pub async fn open(&self, public_passphrase: &mut [u8]) -> Result<(), WalletError> {
        let public_passphrase = ScopedPassphrase::new(public_passphrase);
        let wallet_id = self.id();

        let _transition = self.transition.lock().await;
        match &*self.slot.read() {
            EngineSlot::Open(_) => return Ok(()),
            EngineSlot::Deleted => return Err(WalletError::NotExist),
            EngineSlot::Uninitialized | EngineSlot::Closed => {}
        }

        let engine = self
            .loader
            .open_existing_wallet(public_passphrase.or_insecure_default())
            .await
            .map_err(|e| {
                error!(wallet_id, "Failed to open wallet: {}", e);
                WalletError::from(e)
            })?;
        *self.slot.write() = EngineSlot::Open(engine);

        info!(wallet_id, "Opened wallet");
        Ok(())
    }

    /// Unloads the engine handle. The wallet stays on disk; reopen before use.
    pub async fn close(&self) -> Result<(), WalletError> {
        let _transition = self.transition.lock().await;
        if !self.opened() {
            return Ok(());
        }

        self.loader.unload_wallet().await?;
        *self.slot.write() = EngineSlot::Closed;

        info!(wallet_id = self.id(), "Closed wallet");
        Ok(())
    }

    /// Asks the loader whether the wallet exists on disk.
    pub async fn wallet_exists(&self) -> Result<bool, WalletError> {
        Ok(self.loader.wallet_exists().await?)
    }

    /// Destroys the wallet: verifies `passphrase`, relocks, cancels this
    /// wallet's background work, unloads the engine and removes the data
    /// directory.
    ///
    /// Nothing irreversible happens before the passphrase is verified. If a
    /// previous attempt already unloaded the engine, only the directory
    /// removal is retried, and `passphrase` is wiped without being checked:
    /// there is no engine left to check it against.
    ///
    /// # Errors
    /// * `WalletError::WalletNotLoaded` - If the wallet is not open
    /// * `WalletError::InvalidPassphrase` - If the passphrase is rejected
    /// * `WalletError::Io` - If the data directory cannot be removed
    pub async fn delete(&self, passphrase: &mut [u8]) -> Result<(), WalletError> {
        let passphrase = ScopedPassphrase::new(passphrase);
        let wallet_id = self.id();

        let _transition = self.transition.lock().await;
        let already_deleted = matches!(*self.slot.read(), EngineSlot::Deleted);

        if !already_deleted {
            let engine = self.engine()?;
            engine.unlock(&passphrase, None).await.map_err(|e| {
                error!(wallet_id, "Unlock before delete failed: {}", e);
                WalletError::from(e)
            })?;
            engine.lock().await;

            self.shutdown.cancel();

            if let Err(e) = self.loader.unload_wallet().await {
                error!(wallet_id, "Failed to unload wallet before delete: {}", e);
                return Err(e.into());
            }
            *self.slot.write() = EngineSlot::Deleted;
        }

        info!(wallet_id, "Deleting wallet");
        remove_data_dir(&self.data_dir()).await
    }

    /// Undoes a `create` whose registration failed.
    pub(crate) async fn discard(&self) {
        let wallet_id = self.id();
        let _transition = self.transition.lock().await;
        self.shutdown.cancel();
        if self.opened() {
            if let Err(e) = self.loader.unload_wallet().await {
                warn!(wallet_id, "Failed to unload discarded wallet: {}", e);
            }
        }
        *self.slot.write() = EngineSlot::Deleted;
        if let Err(e) = remove_data_dir(&self.data_dir()).await {
            warn!(wallet_id, "Failed to remove discarded wallet directory: {}", e);
        }
    }
}

/// Removes `dir` recursively; a missing directory counts as removed.
async fn remove_data_dir(dir: &Path) -> Result<(), WalletError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
