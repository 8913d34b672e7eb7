//! Abstract encryption interface for the storage write pipeline.
//!
//! The storage manager depends on `Arc<dyn PayloadCipher>` — it never sees
//! raw key material. `AeadCipher` is the production implementation; tests
//! use `PassthroughCipher` for zero-overhead operation without a key.

use crate::cipher::{EncryptedData, decrypt, encrypt};
use crate::error::CryptoResult;
use crate::key::DerivedKey;

/// Trait for encrypting/decrypting opaque byte slices.
///
/// Implementations own the key material. Callers never see raw keys.
pub trait PayloadCipher: Send + Sync {
    /// Encrypt `data`, returning an opaque blob (nonce prepended).
    fn encrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypt a blob previously produced by `encrypt_bytes`.
    fn decrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// ChaCha20-Poly1305 cipher holding a derived key.
pub struct AeadCipher {
    key: DerivedKey,
}

impl AeadCipher {
    /// Creates a cipher from a derived key.
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }
}

impl PayloadCipher for AeadCipher {
    fn encrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(encrypt(&self.key, data)?.to_bytes())
    }

    fn decrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let encrypted = EncryptedData::from_bytes(data)?;
        decrypt(&self.key, &encrypted)
    }
}

/// No-op cipher for tests and unencrypted deployments.
/// Data passes through unchanged.
pub struct PassthroughCipher;

impl PayloadCipher for PassthroughCipher {
    fn encrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn aead_cipher_roundtrip() {
        let cipher = AeadCipher::new(generate_random_key());
        let blob = cipher.encrypt_bytes(b"component payload").unwrap();
        assert_ne!(blob, b"component payload");
        assert_eq!(cipher.decrypt_bytes(&blob).unwrap(), b"component payload");
    }

    #[test]
    fn passthrough_is_identity() {
        let cipher = PassthroughCipher;
        let blob = cipher.encrypt_bytes(b"data").unwrap();
        assert_eq!(blob, b"data");
        assert_eq!(cipher.decrypt_bytes(&blob).unwrap(), b"data");
    }

    #[test]
    fn aead_rejects_garbage() {
        let cipher = AeadCipher::new(generate_random_key());
        assert!(cipher.decrypt_bytes(b"not a ciphertext blob").is_err());
    }
}
