//! Password hashing seam.
//!
//! The store persists opaque [`PasswordHash`] bytes and never sees plain
//! text. Deployments that need a memory-hard KDF plug in their own
//! [`PasswordHasher`].

use bizreg_core::PasswordHash;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Turns plain-text passwords into stored hashes.
pub trait PasswordHasher: Send + Sync {
    /// Hash `password` with a fresh salt.
    fn hash(&self, password: &str) -> PasswordHash;

    /// Check `password` against a stored hash.
    ///
    /// Nothing in this service logs users in; the upstream authenticator
    /// that issues the `x-user-id` header verifies credentials through
    /// this method against the hash `hash` produced.
    fn verify(&self, password: &str, hash: &PasswordHash) -> bool;
}

/// `salt || SHA-256(salt || password)` with a 16-byte random salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedSha256;

impl SaltedSha256 {
    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

impl PasswordHasher for SaltedSha256 {
    fn hash(&self, password: &str) -> PasswordHash {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut bytes = salt.to_vec();
        bytes.extend_from_slice(&Self::digest(&salt, password));
        PasswordHash::new(bytes)
    }

    fn verify(&self, password: &str, hash: &PasswordHash) -> bool {
        let bytes = hash.as_bytes();
        if bytes.len() != SALT_LEN + 32 {
            return false;
        }
        let (salt, expected) = bytes.split_at(SALT_LEN);
        let actual = Self::digest(salt, password);
        // Fold the comparison so its duration does not depend on the
        // position of the first differing byte.
        actual
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
