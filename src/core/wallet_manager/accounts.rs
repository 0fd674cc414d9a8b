//! Per-wallet settings kept in the registry record

use tracing::info;

use super::WalletManager;
use crate::core::errors::WalletError;
use crate::core::wallet_info::WalletId;

impl WalletManager {
    /// Makes `account` the default for wallet `id` after checking the
    /// account resolves on the open wallet.
    ///
    /// # Errors
    /// * `WalletError::NotExist` - If no wallet has this id
    /// * `WalletError::Translated` - If the engine does not know the account
    pub async fn set_default_account(&self, id: WalletId, account: u32) -> Result<(), WalletError> {
        let _mutations = self.mutations.lock().await;
        let wallet = self.wallet(id)?;
        wallet.account_name_raw(account).await?;

        let mut record = wallet.record();
        record.default_account = account;
        self.store.save(&record).await?;
        wallet.set_record(record);

        info!(wallet_id = id, account, "Default account updated");
        Ok(())
    }

    /// Records that account discovery has run for wallet `id`. Idempotent.
    pub async fn set_discovered_accounts(&self, id: WalletId) -> Result<(), WalletError> {
        let _mutations = self.mutations.lock().await;
        let wallet = self.wallet(id)?;
        if wallet.has_discovered_accounts() {
            return Ok(());
        }

        let mut record = wallet.record();
        record.discovered_accounts = true;
        self.store.save(&record).await?;
        wallet.set_record(record);
        Ok(())
    }
}
