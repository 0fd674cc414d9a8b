//! Passphrase-gated operations
//!
//! Runs an operation while the wallet is transiently unlocked. Whatever the
//! outcome, the passphrase buffer is zeroed and the engine's relock token
//! fires exactly once.

use std::future::Future;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::core::engine::{RelockReceiver, WalletEngine};
use crate::core::errors::WalletError;
use crate::security::secret::ScopedPassphrase;

/// Sending half of a relock token. Fires on [`RelockSignal::send`] or on drop,
/// never more than once.
#[derive(Debug)]
pub struct RelockSignal {
    tx: Option<oneshot::Sender<()>>,
}

impl RelockSignal {
    pub fn new() -> (Self, RelockReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn send(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The engine may already have dropped its receiver; it is locked then.
            let _ = tx.send(());
        }
    }
}

impl Drop for RelockSignal {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Unlocks `engine` with `passphrase`, runs `op`, then relocks.
///
/// `op` receives a child of `shutdown`; if `shutdown` is cancelled while `op`
/// runs, `op` is abandoned and [`WalletError::Cancelled`] is returned.
pub async fn with_unlocked<T, F, Fut>(
    engine: &dyn WalletEngine,
    passphrase: ScopedPassphrase<'_>,
    shutdown: &CancellationToken,
    op: F,
) -> Result<T, WalletError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    // Declared before `relock` so the relock fires first, then the wipe.
    let passphrase = passphrase;
    if shutdown.is_cancelled() {
        return Err(WalletError::Cancelled);
    }
    let (relock, relock_rx) = RelockSignal::new();

    if let Err(e) = engine.unlock(&passphrase, Some(relock_rx)).await {
        error!("unlock for gated operation failed: {}", e);
        relock.send();
        return Err(WalletError::InvalidPassphrase);
    }

    if shutdown.is_cancelled() {
        return Err(WalletError::Cancelled);
    }

    let ctx = shutdown.child_token();
    let _ctx_guard = ctx.clone().drop_guard();

    let result = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            debug!("gated operation cancelled by shutdown");
            Err(WalletError::Cancelled)
        }
        res = op(ctx) => res,
    };

    relock.send();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wallet_manager::testing::MockEngine;

    #[tokio::test]
    async fn test_relock_signal_fires_once_on_drop() {
        let (signal, mut rx) = RelockSignal::new();
        drop(signal);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_gated_success_relocks_and_zeroes() {
        let engine = MockEngine::with_passphrase(b"pass");
        let shutdown = CancellationToken::new();
        let mut buf = b"pass".to_vec();

        let out = with_unlocked(&engine, ScopedPassphrase::new(&mut buf), &shutdown, |_ctx| async {
            Ok::<_, WalletError>(7u32)
        })
        .await;

        assert_eq!(out, Ok(7));
        assert!(buf.iter().all(|&b| b == 0));
        assert!(engine.locked().await);
        assert_eq!(engine.relock_count(), 1);
    }

    #[tokio::test]
    async fn test_gated_wrong_passphrase_is_invalid_passphrase() {
        let engine = MockEngine::with_passphrase(b"pass");
        let shutdown = CancellationToken::new();
        let mut buf = b"nope".to_vec();
        let mut ran = false;

        let out = with_unlocked(&engine, ScopedPassphrase::new(&mut buf), &shutdown, |_ctx| {
            ran = true;
            async { Ok::<_, WalletError>(()) }
        })
        .await;

        assert_eq!(out, Err(WalletError::InvalidPassphrase));
        assert!(!ran);
        assert!(buf.iter().all(|&b| b == 0));
        assert!(engine.locked().await);
    }

    #[tokio::test]
    async fn test_gated_operation_error_still_relocks() {
        let engine = MockEngine::with_passphrase(b"pass");
        let shutdown = CancellationToken::new();
        let mut buf = b"pass".to_vec();

        let out: Result<(), _> =
            with_unlocked(&engine, ScopedPassphrase::new(&mut buf), &shutdown, |_ctx| async {
                Err(WalletError::Translated("engine exploded".into()))
            })
            .await;

        assert!(matches!(out, Err(WalletError::Translated(_))));
        assert!(buf.iter().all(|&b| b == 0));
        assert!(engine.locked().await);
        assert_eq!(engine.relock_count(), 1);
    }

    #[tokio::test]
    async fn test_gated_cancelled_before_unlock_never_unlocks() {
        let engine = MockEngine::with_passphrase(b"pass");
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut buf = b"pass".to_vec();
        let mut ran = false;

        let out = with_unlocked(&engine, ScopedPassphrase::new(&mut buf), &shutdown, |_ctx| {
            ran = true;
            async { Ok::<_, WalletError>(()) }
        })
        .await;

        assert_eq!(out, Err(WalletError::Cancelled));
        assert!(!ran);
        assert!(buf.iter().all(|&b| b == 0));
        assert!(engine.locked().await);
        assert_eq!(engine.relock_count(), 0);
    }

    #[tokio::test]
    async fn test_gated_observes_shutdown() {
        let engine = MockEngine::with_passphrase(b"pass");
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let mut buf = b"pass".to_vec();

        let out: Result<(), _> =
            with_unlocked(&engine, ScopedPassphrase::new(&mut buf), &shutdown, |_ctx| async move {
                trigger.cancel();
                std::future::pending::<()>().await;
                Ok(())
            })
            .await;

        assert_eq!(out, Err(WalletError::Cancelled));
        assert!(buf.iter().all(|&b| b == 0));
        assert!(engine.locked().await);
    }
}
