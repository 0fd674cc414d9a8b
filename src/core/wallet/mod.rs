//! Per-wallet lifecycle controller
//!
//! A [`Wallet`] owns one wallet record and, while open, the engine handle for
//! it. State moves `Uninitialized -> Open (locked/unlocked) -> Closed`, with
//! `Deleted` terminal.
//!
//! ## Module Structure
//! - `lifecycle` - create, open, close, delete
//! - `passphrase` - unlock, lock, passphrase changes
//! - `balance` - balance projection and spendable reads
//! - `accounts` - account listing, lookups and creation
//! - `seed` - seed decoding and generation

pub mod accounts;
pub mod balance;
pub mod lifecycle;
pub mod passphrase;
pub mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::core::engine::{WalletEngine, WalletLoader};
use crate::core::errors::WalletError;
use crate::core::wallet_info::{PassphraseType, WalletId, WalletRecord};

pub use accounts::KEY_LOOKAHEAD;

/// Engine handle slot. Every operation has to say what it does when closed.
pub(crate) enum EngineSlot {
    Uninitialized,
    Open(Arc<dyn WalletEngine>),
    Closed,
    Deleted,
}

/// Observable wallet state; lock state is queried live from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Uninitialized,
    Locked,
    Unlocked,
    Closed,
    Deleted,
}

/// wallet controller
pub struct Wallet {
    record: RwLock<WalletRecord>,
    loader: Arc<dyn WalletLoader>,
    slot: RwLock<EngineSlot>,
    /// Serializes create/open/close/delete on this wallet.
    transition: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl Wallet {
    /// Controller for a wallet that does not exist on disk yet.
    pub fn new(record: WalletRecord, loader: Arc<dyn WalletLoader>, shutdown: CancellationToken) -> Self {
        Self::with_slot(record, loader, shutdown, EngineSlot::Uninitialized)
    }

    /// Controller for a wallet that exists on disk but is not open.
    pub fn existing(record: WalletRecord, loader: Arc<dyn WalletLoader>, shutdown: CancellationToken) -> Self {
        Self::with_slot(record, loader, shutdown, EngineSlot::Closed)
    }

    fn with_slot(
        record: WalletRecord,
        loader: Arc<dyn WalletLoader>,
        shutdown: CancellationToken,
        slot: EngineSlot,
    ) -> Self {
        Self {
            record: RwLock::new(record),
            loader,
            slot: RwLock::new(slot),
            transition: tokio::sync::Mutex::new(()),
            shutdown,
        }
    }

    pub fn id(&self) -> WalletId {
        self.record.read().id
    }

    pub fn name(&self) -> String {
        self.record.read().name.clone()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.record.read().data_dir.clone()
    }

    pub fn default_account(&self) -> u32 {
        self.record.read().default_account
    }

    pub fn spending_passphrase_type(&self) -> PassphraseType {
        self.record.read().spending_passphrase_type
    }

    pub fn has_discovered_accounts(&self) -> bool {
        self.record.read().discovered_accounts
    }

    /// Snapshot of the persisted record.
    pub fn record(&self) -> WalletRecord {
        self.record.read().clone()
    }

    /// Replaces the in-memory record. Callers persist first.
    pub(crate) fn set_record(&self, record: WalletRecord) {
        *self.record.write() = record;
    }

    /// Cancelled when this wallet is deleted or the registry shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// True iff an engine handle is attached.
    pub fn opened(&self) -> bool {
        matches!(*self.slot.read(), EngineSlot::Open(_))
    }

    pub async fn state(&self) -> WalletState {
        let engine = match &*self.slot.read() {
            EngineSlot::Uninitialized => return WalletState::Uninitialized,
            EngineSlot::Closed => return WalletState::Closed,
            EngineSlot::Deleted => return WalletState::Deleted,
            EngineSlot::Open(engine) => engine.clone(),
        };
        if engine.locked().await {
            WalletState::Locked
        } else {
            WalletState::Unlocked
        }
    }

    /// The open engine handle, cloned out so no lock is held across awaits.
    pub(crate) fn engine(&self) -> Result<Arc<dyn WalletEngine>, WalletError> {
        match &*self.slot.read() {
            EngineSlot::Open(engine) => Ok(engine.clone()),
            _ => Err(WalletError::WalletNotLoaded),
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.read();
        f.debug_struct("Wallet")
            .field("id", &record.id)
            .field("name", &record.name)
            .field("opened", &self.opened())
            .finish()
    }
}
