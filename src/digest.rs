//! Content digests
//!
//! SHA-256 over the stored document, hex-encoded lowercase. The hex form is
//! what lives in the device footer and what all comparisons use.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the SHA-256 digest of a byte span, hex-encoded lowercase.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
