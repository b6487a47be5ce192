//! Cache contract for small objects.
//!
//! The cache stores raw bytes only. It keeps no content type or size, so a
//! read served from cache cannot report a content type.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("value of {size} bytes exceeds the cache entry limit of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// TTL-bounded byte-blob store keyed by derived cache keys.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;
}
