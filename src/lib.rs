//! Multi-wallet registry and wallet lifecycle core.

pub mod core;
pub mod logging;
pub mod security;
pub mod storage;

pub use crate::core::errors::WalletError;
pub use crate::core::wallet::Wallet;
pub use crate::core::wallet_manager::WalletManager;
