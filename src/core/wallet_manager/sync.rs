//! Registry-wide sync flag
//!
//! One flag guards every wallet: while a sync runs no wallet may be deleted,
//! and while a deletion runs no sync may start. Transitions are
//! compare-and-set so concurrent starts cannot both win.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::errors::WalletError;

const IDLE: u8 = 0;
const SYNCING: u8 = 1;
const DELETING: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct SyncFlag {
    state: Arc<AtomicU8>,
}

/// Holds the flag until dropped.
#[derive(Debug)]
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct SyncGuard {
    state: Arc<AtomicU8>,
}

impl SyncFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a sync as running.
    ///
    /// # Errors
    /// * `WalletError::SyncAlreadyInProgress` - If another sync holds the flag
    /// * `WalletError::Busy` - If a deletion holds the flag
    pub fn try_begin_sync(&self) -> Result<SyncGuard, WalletError> {
        self.acquire(SYNCING)
    }

    /// Marks a deletion as running; same errors as [`try_begin_sync`](Self::try_begin_sync).
    pub(crate) fn try_begin_deletion(&self) -> Result<SyncGuard, WalletError> {
        self.acquire(DELETING)
    }

    pub fn is_syncing(&self) -> bool {
        self.state.load(Ordering::Acquire) == SYNCING
    }

    fn acquire(&self, to: u8) -> Result<SyncGuard, WalletError> {
        match self
            .state
            .compare_exchange(IDLE, to, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(state = to, "sync flag acquired");
                Ok(SyncGuard { state: self.state.clone() })
            }
            Err(SYNCING) => Err(WalletError::SyncAlreadyInProgress),
            Err(_) => Err(WalletError::Busy),
        }
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
        debug!("sync flag released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_is_exclusive() {
        let flag = SyncFlag::new();
        let guard = flag.try_begin_sync().unwrap();
        assert!(flag.is_syncing());
        assert_eq!(flag.try_begin_sync().unwrap_err(), WalletError::SyncAlreadyInProgress);
        assert_eq!(flag.try_begin_deletion().unwrap_err(), WalletError::SyncAlreadyInProgress);

        drop(guard);
        assert!(!flag.is_syncing());
        let _again = flag.try_begin_sync().unwrap();
    }

    #[test]
    fn test_deletion_blocks_sync() {
        let flag = SyncFlag::new();
        let guard = flag.try_begin_deletion().unwrap();
        assert!(!flag.is_syncing());
        assert_eq!(flag.try_begin_sync().unwrap_err(), WalletError::Busy);
        assert_eq!(flag.try_begin_deletion().unwrap_err(), WalletError::Busy);

        drop(guard);
        assert!(flag.try_begin_sync().is_ok());
    }

    #[test]
    fn test_concurrent_starts_single_winner() {
        let flag = SyncFlag::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flag = flag.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    flag.try_begin_sync()
                })
            })
            .collect();

        // Winning guards stay alive in `results` until every thread has tried.
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }
}
