//! Metadata record mapping a logical object to its physical location.

use super::{address::LogicalAddress, address::StorageClass, location::ObjectLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where the authoritative copy and any cached copy of an object live.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
pub enum BackendMode {
    /// Small object: written through the cache and to the backend.
    #[serde(rename = "CACHE_AND_BACKEND")]
    #[sqlx(rename = "CACHE_AND_BACKEND")]
    CacheAndBackend,
    /// Large or unsized object: streamed to the backend only.
    #[serde(rename = "BACKEND_ONLY")]
    #[sqlx(rename = "BACKEND_ONLY")]
    BackendOnly,
}

/// Lifecycle state of a record. Deleted rows are kept (soft delete).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
pub enum ObjectStatus {
    #[serde(rename = "ACTIVE")]
    #[sqlx(rename = "ACTIVE")]
    Active,
    #[serde(rename = "DELETED")]
    #[sqlx(rename = "DELETED")]
    Deleted,
}

/// Durable metadata row for one version of a logical object.
///
/// Records are built by the tiering service and handed to a metadata store,
/// which owns them from then on: the store assigns `version`, `created_at` and
/// `updated_at` on upsert and flips `status` on delete.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    #[sqlx(flatten)]
    pub address: LogicalAddress,

    /// Size in bytes as observed (small objects) or declared (large objects).
    pub size_bytes: i64,

    /// Content type (MIME type) supplied on upload.
    pub content_type: Option<String>,

    /// Storage class the object was routed with.
    pub storage_class: StorageClass,

    #[sqlx(rename = "store_backend")]
    pub backend_mode: BackendMode,

    #[sqlx(flatten)]
    pub location: ObjectLocation,

    /// Opaque entity tag returned by the backend.
    pub etag: String,

    /// Starts at 1 and grows by one on each overwrite of an active record.
    pub version: i64,

    pub status: ObjectStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ObjectRecord {
    /// Build a fresh active record. Bookkeeping fields are placeholders until
    /// the metadata store persists it.
    pub fn new(
        address: LogicalAddress,
        location: ObjectLocation,
        size_bytes: i64,
        content_type: Option<String>,
        storage_class: StorageClass,
        backend_mode: BackendMode,
        etag: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address,
            size_bytes,
            content_type,
            storage_class,
            backend_mode,
            location,
            etag,
            version: 1,
            status: ObjectStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        match self.status {
            ObjectStatus::Active => true,
            ObjectStatus::Deleted => false,
        }
    }
}
