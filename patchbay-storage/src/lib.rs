//! Encrypted, compressed key/value persistence for Patchbay.
//!
//! # Architecture
//!
//! - `KvStore` — SQLite-backed blob store with fixed per-category key
//!   namespaces (`component_` / `config_` / `backup_` / `resource_`)
//! - `StorageManager` — the caching front: serialize → compress → encrypt
//!   on write, the exact inverse on read
//! - `MemoryCache` — bounded plaintext cache with hit/miss accounting
//!
//! Corrupt rows degrade to not-found on read; they never crash a caller.

mod cache;
mod error;
mod kv;
mod manager;
mod pipeline;

pub use cache::{CacheStats, MemoryCache};
pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, StorageCategory};
pub use manager::{ImportReport, StorageManager};
pub use pipeline::{compress, decompress};
