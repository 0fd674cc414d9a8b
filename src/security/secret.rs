//! Small helpers for secret buffers that must be zeroized.
use std::ops::{Deref, DerefMut};

use zeroize::{Zeroize, Zeroizing};

use crate::core::engine::INSECURE_PUBLIC_PASSPHRASE;

/// Common alias for secret byte buffers which will be zeroed when dropped.
pub type SecretVec = Zeroizing<Vec<u8>>;

/// Borrowed passphrase buffer that is wiped when the scope ends.
///
/// The buffer belongs to the caller; every byte is zeroed on drop, which
/// covers early returns, `?` propagation and unwinding alike.
pub struct ScopedPassphrase<'a> {
    buf: &'a mut [u8],
}

impl<'a> ScopedPassphrase<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// The passphrase, or the well-known public default when empty.
    pub fn or_insecure_default(&self) -> &[u8] {
        if self.buf.is_empty() {
            INSECURE_PUBLIC_PASSPHRASE
        } else {
            &*self.buf
        }
    }
}

impl Deref for ScopedPassphrase<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &*self.buf
    }
}

impl DerefMut for ScopedPassphrase<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut *self.buf
    }
}

impl Drop for ScopedPassphrase<'_> {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

impl std::fmt::Debug for ScopedPassphrase<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScopedPassphrase([REDACTED; {}])", self.buf.len())
    }
}
