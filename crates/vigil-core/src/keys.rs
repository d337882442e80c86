//! Cipher key derivation.
//!
//! An operator password is turned into a fixed-length symmetric key by a
//! single SHA-256 pass. The derivation is deterministic and machine
//! independent: the same password yields the same key on every host, every
//! run. The machine fingerprint deliberately plays no part here — it salts
//! only the stored credential (see [`crate::credential`]).

use sha2::{Digest, Sha256};

/// A 256-bit symmetric key derived from an operator password.
///
/// Held in process memory for the lifetime of the process and never
/// persisted anywhere.
#[derive(Clone)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    /// Raw key bytes, sized for AES-256.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    // Never leak key material through Debug formatting.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive the symmetric key for a password. Pure and infallible: any
/// non-empty string is a valid input.
pub fn derive_key(password: &str) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    DerivedKey(digest)
}
