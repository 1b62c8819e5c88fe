//! Shared SHA-256 hex digest utilities.
//!
//! Used by the artifact cache for content fingerprints and cache keys.

use sha2::{Digest, Sha256};

/// Length (hex chars) of a short digest: 64 bits of SHA-256.
pub const SHORT_DIGEST_LEN: usize = 16;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Fixed-length prefix of [`sha256_hex`].
pub fn short_digest(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(SHORT_DIGEST_LEN);
    hex
}
