//! Encryption and integrity layer for Patchbay.
//!
//! Provides the ChaCha20-Poly1305 cipher used by the storage write pipeline,
//! Argon2id key derivation, SHA-256 integrity digests, and the
//! `PayloadCipher` seam consumed by the storage manager.

mod cipher;
mod digest;
mod encryptor;
mod error;
mod key;

pub use cipher::{EncryptedData, NONCE_SIZE, TAG_SIZE, decrypt, encrypt};
pub use digest::{keyed_signature, sha256_hex, verify_signature};
pub use encryptor::{AeadCipher, PassthroughCipher, PayloadCipher};
pub use error::{CryptoError, CryptoResult};
pub use key::{DerivedKey, KEY_SIZE, KdfParams, SALT_SIZE, Salt, derive_key, generate_random_key};
