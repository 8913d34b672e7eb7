//! Integrity digests: content checksums and keyed signatures.
//!
//! Component checksums are plain SHA-256 hex digests of the payload.
//! Signatures are a keyed digest over the checksum: the update source and
//! the engine share a signing key, and a descriptor is considered signed
//! when `signature == sha256_hex(signing_key || checksum)`.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of arbitrary bytes.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Produces the keyed signature for a content checksum.
#[must_use]
pub fn keyed_signature(signing_key: &str, checksum: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signing_key.as_bytes());
    hasher.update(checksum.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies a descriptor signature against the configured signing key.
#[must_use]
pub fn verify_signature(signing_key: &str, checksum: &str, signature: &str) -> bool {
    !signature.is_empty() && keyed_signature(signing_key, checksum) == signature
}
