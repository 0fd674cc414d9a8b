pub mod config;
pub mod engine;
pub mod errors;
pub mod result_ext;
pub mod wallet;
pub mod wallet_info;
pub mod wallet_manager;

pub use wallet_info::{Account, Accounts, Balance, WalletRecord};
pub use wallet_manager::WalletManager;
