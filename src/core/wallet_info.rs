//! Wallet records and account summaries

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::engine::EngineBalances;

/// Registry-assigned wallet identifier.
pub type WalletId = i64;

/// Prefix reserved for registry-generated wallet names.
pub const RESERVED_NAME_PREFIX: &str = "wallet-";

/// How the spending passphrase is entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassphraseType {
    Pin,
    Password,
}

impl PassphraseType {
    pub fn as_i64(self) -> i64 {
        match self {
            PassphraseType::Pin => 0,
            PassphraseType::Password => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(PassphraseType::Pin),
            1 => Some(PassphraseType::Password),
            _ => None,
        }
    }
}

/// Persisted identity and configuration of one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: WalletId,
    pub name: String,
    pub data_dir: PathBuf,
    pub default_account: u32,
    pub spending_passphrase_type: PassphraseType,
    pub discovered_accounts: bool,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    /// Creates a record for a wallet that has not been materialized yet.
    pub fn new(
        id: WalletId,
        name: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        spending_passphrase_type: PassphraseType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            data_dir: data_dir.into(),
            default_account: 0,
            spending_passphrase_type,
            discovered_accounts: false,
            created_at: Utc::now(),
        }
    }
}

/// Balance breakdown for one account, in the chain's smallest unit.
///
/// Components may overlap; `total >= spendable` is not guaranteed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total: u64,
    pub spendable: u64,
    pub immature_reward: u64,
    pub immature_stake_generation: u64,
    pub locked_by_tickets: u64,
    pub voting_authority: u64,
    pub unconfirmed: u64,
}

impl From<EngineBalances> for Balance {
    fn from(raw: EngineBalances) -> Self {
        Self {
            total: raw.total,
            spendable: raw.spendable,
            immature_reward: raw.immature_coinbase_rewards,
            immature_stake_generation: raw.immature_stake_generation,
            locked_by_tickets: raw.locked_by_tickets,
            voting_authority: raw.voting_authority,
            unconfirmed: raw.unconfirmed,
        }
    }
}

/// Read-only account summary, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub number: u32,
    pub name: String,
    pub total_balance: u64,
    pub balance: Balance,
    pub external_key_count: u64,
    pub internal_key_count: u64,
    pub imported_key_count: u64,
}

/// All accounts of a wallet plus the chain tip they were computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accounts {
    pub count: usize,
    #[serde(with = "hex::serde")]
    pub current_block_hash: [u8; 32],
    pub current_block_height: i32,
    pub accounts: Vec<Account>,
}
