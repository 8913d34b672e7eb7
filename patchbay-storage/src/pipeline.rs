//! Compression half of the persistence pipeline.
//!
//! The write pipeline order is fixed: serialize → compress → encrypt →
//! persist. Reads run the exact inverse. Compression happens before
//! encryption because ciphertext does not compress.

use crate::error::StorageResult;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

/// Deflate-compresses a plaintext blob.
pub fn compress(data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates a blob produced by `compress`.
pub fn decompress(data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
