//! Account listing, lookups and creation

use tracing::{error, info};

use super::balance::compute_balance;
use super::Wallet;
use crate::core::engine::AccountProperties;
use crate::core::errors::WalletError;
use crate::core::result_ext::ResultExt;
use crate::core::wallet_info::{Account, Accounts, Balance};
use crate::security::{with_unlocked, ScopedPassphrase};

/// Keys the engine keeps derived past the last used index.
pub const KEY_LOOKAHEAD: u64 = 20;

/// Display name returned by the lenient name lookup.
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";

fn summarize(props: AccountProperties, total_balance: u64, balance: Balance) -> Account {
    Account {
        number: props.account_number,
        name: props.account_name,
        total_balance,
        balance,
        external_key_count: u64::from(props.last_used_external_index) + KEY_LOOKAHEAD,
        internal_key_count: u64::from(props.last_used_internal_index) + KEY_LOOKAHEAD,
        imported_key_count: u64::from(props.imported_key_count),
    }
}

impl Wallet {
    /// Summaries of every account, in engine order.
    ///
    /// Fails on the first account whose balance cannot be computed; a partial
    /// list is never returned.
    pub async fn accounts(&self, required_confirmations: u32) -> Result<Accounts, WalletError> {
        let engine = self.engine()?;
        let resp = engine.accounts().await?;

        let mut accounts = Vec::with_capacity(resp.accounts.len());
        for account in resp.accounts {
            let number = account.properties.account_number;
            let balance = compute_balance(engine.as_ref(), number, required_confirmations).await?;
            accounts.push(summarize(account.properties, account.total_balance, balance));
        }

        Ok(Accounts {
            count: accounts.len(),
            current_block_hash: resp.current_block_hash,
            current_block_height: resp.current_block_height,
            accounts,
        })
    }

    /// JSON form of [`accounts`](Self::accounts). Account errors propagate;
    /// an encoding failure yields `"{}"`.
    pub async fn accounts_json(&self, required_confirmations: u32) -> Result<String, WalletError> {
        let accounts = self.accounts(required_confirmations).await?;
        Ok(serde_json::to_string(&accounts).unwrap_or_log("{}".to_string(), "encode accounts"))
    }

    pub async fn account(&self, number: u32, required_confirmations: u32) -> Result<Account, WalletError> {
        let engine = self.engine()?;
        let props = engine.account_properties(number).await?;
        let balance = compute_balance(engine.as_ref(), number, required_confirmations).await?;
        Ok(summarize(props, balance.total, balance))
    }

    /// Account name for display; [`ACCOUNT_NOT_FOUND`] when the lookup fails.
    pub async fn account_name(&self, number: u32) -> String {
        self.account_name_raw(number)
            .await
            .unwrap_or_log(ACCOUNT_NOT_FOUND.to_string(), "account name lookup")
    }

    pub async fn account_name_raw(&self, number: u32) -> Result<String, WalletError> {
        let engine = self.engine()?;
        Ok(engine.account_name(number).await?)
    }

    pub async fn account_number(&self, name: &str) -> Result<u32, WalletError> {
        let engine = self.engine()?;
        Ok(engine.account_number(name).await?)
    }

    pub async fn rename_account(&self, number: u32, new_name: &str) -> Result<(), WalletError> {
        let engine = self.engine()?;
        engine.rename_account(number, new_name).await?;
        info!(wallet_id = self.id(), account = number, "Renamed account");
        Ok(())
    }

    /// Creates the next account under a transient unlock.
    ///
    /// The passphrase is zeroed and the wallet relocked on every path; the
    /// derivation is abandoned with `WalletError::Cancelled` on shutdown.
    pub async fn next_account(&self, name: &str, passphrase: &mut [u8]) -> Result<u32, WalletError> {
        let passphrase = ScopedPassphrase::new(passphrase);
        let engine = self.engine()?;
        let wallet_id = self.id();

        let gated = engine.clone();
        let number = with_unlocked(engine.as_ref(), passphrase, &self.shutdown, |ctx| async move {
            gated.next_account(&ctx, name).await.map_err(WalletError::from)
        })
        .await
        .map_err(|e| {
            error!(wallet_id, "Failed to create account: {}", e);
            e
        })?;

        info!(wallet_id, account = number, "Created account");
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::EngineBalances;
    use crate::core::wallet_manager::testing::{open_test_wallet, MockLoaderFactory};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_accounts_lookahead_counts() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();
        engine.add_account("savings", 4, 7, 2);
        engine.set_balances(1, EngineBalances { total: 50, spendable: 50, ..Default::default() });

        let accounts = wallet.accounts(1).await.unwrap();
        assert_eq!(accounts.count, 2);
        assert_eq!(accounts.accounts.len(), 2);
        assert_eq!(accounts.current_block_height, engine.block_height());

        let savings = &accounts.accounts[1];
        assert_eq!(savings.name, "savings");
        assert_eq!(savings.external_key_count, 4 + KEY_LOOKAHEAD);
        assert_eq!(savings.internal_key_count, 7 + KEY_LOOKAHEAD);
        assert_eq!(savings.imported_key_count, 2);
        assert_eq!(savings.total_balance, 50);
        for account in &accounts.accounts {
            let props = engine.properties(account.number).unwrap();
            assert_eq!(account.external_key_count, u64::from(props.last_used_external_index) + 20);
            assert_eq!(account.internal_key_count, u64::from(props.last_used_internal_index) + 20);
        }
    }

    #[tokio::test]
    async fn test_lookahead_does_not_overflow() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();
        let number = engine.add_account("busy", u32::MAX, u32::MAX, 0);

        let account = wallet.account(number, 0).await.unwrap();
        assert_eq!(account.external_key_count, u64::from(u32::MAX) + KEY_LOOKAHEAD);
    }

    #[tokio::test]
    async fn test_accounts_fail_fast_on_balance_error() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();
        engine.add_account("savings", 0, 0, 0);
        engine.fail_balance_for(1);

        assert!(wallet.accounts(1).await.is_err());
        assert!(wallet.accounts_json(1).await.is_err());
        assert!(wallet.account(1, 1).await.is_err());
        assert!(wallet.account(0, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_single_account_uses_balance_total() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();
        engine.set_balances(0, EngineBalances { total: 900, spendable: 100, ..Default::default() });

        let account = wallet.account(0, 1).await.unwrap();
        assert_eq!(account.total_balance, 900);
        assert_eq!(account.balance.spendable, 100);
    }

    #[tokio::test]
    async fn test_accounts_json_shape() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;

        let json = wallet.accounts_json(0).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["accounts"][0]["name"], "default");
        assert_eq!(value["accounts"][0]["externalKeyCount"], 20);
    }

    #[tokio::test]
    async fn test_account_name_strict_and_lenient() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;

        assert_eq!(wallet.account_name(0).await, "default");
        assert_eq!(wallet.account_name(42).await, ACCOUNT_NOT_FOUND);
        assert!(matches!(wallet.account_name_raw(42).await, Err(WalletError::Translated(_))));
    }

    #[tokio::test]
    async fn test_rename_account_and_number_lookup() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;

        wallet.rename_account(0, "spending").await.unwrap();
        assert_eq!(wallet.account_number("spending").await, Ok(0));
        assert!(wallet.account_number("default").await.is_err());
        assert!(wallet.rename_account(5, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_next_account_relocks_and_zeroes() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();

        let mut pass = b"spend".to_vec();
        let number = wallet.next_account("trading", &mut pass).await.unwrap();

        assert_eq!(number, 1);
        assert!(pass.iter().all(|&b| b == 0));
        assert!(wallet.locked().await);
        assert_eq!(engine.relock_count(), 1);
        assert_eq!(wallet.account_name(1).await, "trading");
    }

    #[tokio::test]
    async fn test_next_account_wrong_passphrase() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;

        let mut pass = b"nope".to_vec();
        let err = wallet.next_account("trading", &mut pass).await.unwrap_err();
        assert_eq!(err, WalletError::InvalidPassphrase);
        assert!(pass.iter().all(|&b| b == 0));
        assert!(wallet.locked().await);
    }

    #[tokio::test]
    async fn test_next_account_duplicate_name_relocks() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = open_test_wallet(&factory, root.path(), b"spend").await;

        let mut pass = b"spend".to_vec();
        let err = wallet.next_account("default", &mut pass).await.unwrap_err();
        assert_eq!(err, WalletError::Exist);
        assert!(wallet.locked().await);
    }

    #[tokio::test]
    async fn test_next_account_cancelled_by_shutdown() {
        let root = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockLoaderFactory::new());
        let wallet = Arc::new(open_test_wallet(&factory, root.path(), b"spend").await);
        let engine = factory.engine_for(&wallet.data_dir()).unwrap();
        engine.stall_next_account(true);

        let task = {
            let wallet = wallet.clone();
            tokio::spawn(async move {
                let mut pass = b"spend".to_vec();
                let result = wallet.next_account("slow", &mut pass).await;
                (result, pass)
            })
        };

        engine.next_account_started().await;
        wallet.shutdown_token().cancel();

        let (result, pass) = task.await.unwrap();
        assert_eq!(result, Err(WalletError::Cancelled));
        assert!(pass.iter().all(|&b| b == 0));
        assert!(wallet.locked().await);
    }
}
