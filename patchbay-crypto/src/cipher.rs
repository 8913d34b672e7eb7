//! Payload encryption using ChaCha20-Poly1305.
//!
//! Provides authenticated encryption with associated data (AEAD).

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypted data with metadata needed for decryption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedData {
    /// The nonce used for encryption (unique per encryption).
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted ciphertext (includes auth tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Returns the total size of the encrypted data.
    pub fn len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    /// Returns true if the ciphertext is empty.
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    /// Flattens to `nonce || ciphertext` for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parses a `nonce || ciphertext` blob produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decryption("data too short".to_string()));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        let ciphertext = bytes[NONCE_SIZE..].to_vec();

        Ok(Self { nonce, ciphertext })
    }
}

/// Encrypts plaintext using ChaCha20-Poly1305 with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts ciphertext using ChaCha20-Poly1305.
///
/// Fails if the key is wrong or the data was tampered with.
pub fn decrypt(key: &DerivedKey, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;
    use proptest::prelude::*;

    #[test]
    fn roundtrip() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"hello world").unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();
        assert_eq!(decrypted, b"hello world");
    }

    #[test]
    fn wrong_key_fails() {
        let key = generate_random_key();
        let other = generate_random_key();
        let encrypted = encrypt(&key, b"secret").unwrap();
        assert!(decrypt(&other, &encrypted).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_random_key();
        let mut encrypted = encrypt(&key, b"secret").unwrap();
        encrypted.ciphertext[0] ^= 0xff;
        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn bytes_roundtrip() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"payload").unwrap();
        let parsed = EncryptedData::from_bytes(&encrypted.to_bytes()).unwrap();
        assert_eq!(decrypt(&key, &parsed).unwrap(), b"payload");
    }

    #[test]
    fn from_bytes_rejects_short_input() {
        assert!(EncryptedData::from_bytes(&[0u8; 4]).is_err());
    }

    proptest! {
        #[test]
        fn decrypt_encrypt_is_identity(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = generate_random_key();
            let encrypted = encrypt(&key, &payload).unwrap();
            let decrypted = decrypt(&key, &encrypted).unwrap();
            prop_assert_eq!(decrypted, payload);
        }
    }
}
