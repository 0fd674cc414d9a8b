//! Unlock, lock and passphrase changes
//!
//! Every passphrase buffer handed to these calls is zeroed before they
//! return, whatever the outcome.

use tracing::{error, info};

use super::Wallet;
use crate::core::errors::WalletError;
use crate::security::ScopedPassphrase;

impl Wallet {
    /// Unlocks the wallet until [`lock`](Self::lock) is called.
    pub async fn unlock(&self, passphrase: &mut [u8]) -> Result<(), WalletError> {
        let passphrase = ScopedPassphrase::new(passphrase);
        let engine = self.engine()?;
        engine.unlock(&passphrase, None).await.map_err(|e| {
            error!(wallet_id = self.id(), "Unlock failed: {}", e);
            WalletError::from(e)
        })
    }

    /// Locks the wallet. Idempotent.
    pub async fn lock(&self) -> Result<(), WalletError> {
        let engine = self.engine()?;
        if !engine.locked().await {
            engine.lock().await;
        }
        Ok(())
    }

    /// Live lock state. A wallet without an engine handle reports locked.
    pub async fn locked(&self) -> bool {
        match self.engine() {
            Ok(engine) => engine.locked().await,
            Err(_) => true,
        }
    }

    pub async fn change_private_passphrase(
        &self,
        old: &mut [u8],
        new: &mut [u8],
    ) -> Result<(), WalletError> {
        let old = ScopedPassphrase::new(old);
        let new = ScopedPassphrase::new(new);
        let engine = self.engine()?;

        engine.change_private_passphrase(&old, &new).await?;
        info!(wallet_id = self.id(), "Changed private passphrase");
        Ok(())
    }

    /// Changes the public passphrase. An empty buffer on either side stands
    /// for the insecure default public passphrase.
    pub async fn change_public_passphrase(
        &self,
        old: &mut [u8],
        new: &mut [u8],
    ) -> Result<(), WalletError> {
        let old = ScopedPassphrase::new(old);
        let new = ScopedPassphrase::new(new);
        let engine = self.engine()?;

        engine
            .change_public_passphrase(old.or_insecure_default(), new.or_insecure_default())
            .await?;
        info!(wallet_id = self.id(), "Changed public passphrase");
        Ok(())
    }
}
