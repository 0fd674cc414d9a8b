//! Secret hygiene: scoped passphrase buffers and passphrase-gated unlocks.

pub mod secret;
pub mod unlock_guard;

pub use secret::{ScopedPassphrase, SecretVec};
pub use unlock_guard::{with_unlocked, RelockSignal};
