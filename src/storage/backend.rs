//! Object backend contract shared by every provider adapter.

use crate::models::{ObjectLocation, ProviderType, StorageClass};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream::BoxStream};
use std::io;
use thiserror::Error;

/// Streamed object payload, the same shape axum hands us for request bodies.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid physical key `{0}`")]
    InvalidKey(String),
    #[error("provider type {0} has no adapter in this build")]
    Unsupported(ProviderType),
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub storage_class: StorageClass,
}

/// A readable object returned by [`ObjectBackend::get`].
pub struct BackendObject {
    pub body: ByteStream,
    /// Size in bytes. `0` when the provider could not tell.
    pub size: i64,
    pub content_type: Option<String>,
}

/// Capability exposed by one physical storage provider.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Store `body` at `location` and return the provider's entity tag.
    ///
    /// `size` is a hint; `0` means unknown.
    async fn put(
        &self,
        location: &ObjectLocation,
        body: ByteStream,
        size: i64,
        options: &PutOptions,
    ) -> BackendResult<String>;

    /// Open the object at `location` for reading.
    async fn get(&self, location: &ObjectLocation) -> BackendResult<BackendObject>;

    /// Remove the object at `location`.
    async fn delete(&self, location: &ObjectLocation) -> BackendResult<()>;
}

/// Wrap an in-memory payload as a single-chunk stream.
pub fn bytes_stream(data: Bytes) -> ByteStream {
    futures::stream::once(async move { Ok(data) }).boxed()
}

/// Drain a stream into one contiguous buffer.
pub async fn collect_stream(mut body: ByteStream) -> io::Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Reject keys that could escape a provider's namespace.
///
/// Mirrors the checks a local directory needs; remote providers accept the
/// same keys, so applying it everywhere keeps layouts portable.
pub fn ensure_key_safe(key: &str) -> BackendResult<()> {
    const MAX_KEY_LEN: usize = 1024;

    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_stream_concatenates_chunks() {
        let chunks = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let body = futures::stream::iter(chunks).boxed();
        let data = collect_stream(body).await.unwrap();
        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test]
    async fn collect_stream_surfaces_errors() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("connection reset")),
        ];
        let body = futures::stream::iter(chunks).boxed();
        assert!(collect_stream(body).await.is_err());
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        assert!(ensure_key_safe("prod/us/assets/a.png").is_ok());
        assert!(ensure_key_safe("prod/us/assets/..hidden").is_ok());
        assert!(ensure_key_safe("").is_err());
        assert!(ensure_key_safe("/etc/passwd").is_err());
        assert!(ensure_key_safe("prod/../../etc").is_err());
        assert!(ensure_key_safe("bad\\key").is_err());
        assert!(ensure_key_safe(&"k".repeat(2000)).is_err());
    }
}
