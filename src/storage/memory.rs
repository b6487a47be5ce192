//! In-memory provider for development and tests.

use super::backend::{
    BackendError, BackendObject, BackendResult, ByteStream, ObjectBackend, PutOptions,
    bytes_stream, collect_stream, ensure_key_safe,
};
use crate::models::ObjectLocation;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// Keeps every object in a concurrent map keyed by (bucket, physical key).
///
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: DashMap<(String, String), StoredObject>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.objects.contains_key(&Self::slot(location))
    }

    fn slot(location: &ObjectLocation) -> (String, String) {
        (
            location.provider_bucket.clone(),
            location.physical_key.clone(),
        )
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn put(
        &self,
        location: &ObjectLocation,
        body: ByteStream,
        _size: i64,
        options: &PutOptions,
    ) -> BackendResult<String> {
        ensure_key_safe(&location.physical_key)?;
        let data = collect_stream(body).await?;
        let etag = format!("{:x}", md5::compute(&data));
        self.objects.insert(
            Self::slot(location),
            StoredObject {
                data,
                content_type: options.content_type.clone(),
            },
        );
        Ok(etag)
    }

    async fn get(&self, location: &ObjectLocation) -> BackendResult<BackendObject> {
        let stored = self
            .objects
            .get(&Self::slot(location))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BackendError::NotFound {
                bucket: location.provider_bucket.clone(),
                key: location.physical_key.clone(),
            })?;

        Ok(BackendObject {
            size: stored.data.len() as i64,
            content_type: stored.content_type,
            body: bytes_stream(stored.data),
        })
    }

    async fn delete(&self, location: &ObjectLocation) -> BackendResult<()> {
        self.objects
            .remove(&Self::slot(location))
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound {
                bucket: location.provider_bucket.clone(),
                key: location.physical_key.clone(),
            })
    }
}
