//! Balance queries

use tracing::error;

use super::Wallet;
use crate::core::engine::WalletEngine;
use crate::core::errors::WalletError;
use crate::core::result_ext::ResultExt;
use crate::core::wallet_info::Balance;

/// Field-by-field projection of the engine's balance snapshot.
pub(crate) async fn compute_balance(
    engine: &dyn WalletEngine,
    account: u32,
    required_confirmations: u32,
) -> Result<Balance, WalletError> {
    let raw = engine
        .calculate_account_balance(account, required_confirmations)
        .await?;
    Ok(Balance::from(raw))
}

impl Wallet {
    /// Balance breakdown for `account`. Errors always propagate.
    pub async fn account_balance(
        &self,
        account: u32,
        required_confirmations: u32,
    ) -> Result<Balance, WalletError> {
        let engine = self.engine()?;
        compute_balance(engine.as_ref(), account, required_confirmations).await
    }

    /// Spendable amount for `account`; failures are logged and translated.
    pub async fn spendable_for_account(
        &self,
        account: u32,
        required_confirmations: u32,
    ) -> Result<u64, WalletError> {
        let engine = self.engine()?;
        engine
            .calculate_account_balance(account, required_confirmations)
            .await
            .map(|b| b.spendable)
            .map_err(|e| {
                error!(wallet_id = self.id(), account, "Spendable balance query failed: {}", e);
                WalletError::from(e)
            })
    }

    /// Best-effort spendable read: zero when the balance cannot be computed.
    pub async fn spendable_for_account_or_zero(&self, account: u32, required_confirmations: u32) -> u64 {
        self.spendable_for_account(account, required_confirmations)
            .await
            .unwrap_or_log(0, "spendable balance")
    }
}
