//! Logical object identity and the keys derived from it.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Storage class used when neither the request nor the configuration names one.
pub const DEFAULT_STORAGE_CLASS: &str = "HOT";

/// Externally visible identity of an object.
///
/// Clients only ever see this address; the physical provider, bucket and key
/// are decided by the gateway and recorded in the object's metadata.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq, Hash)]
pub struct LogicalAddress {
    /// Deployment environment (e.g. "prod", "staging").
    pub env: String,

    /// Logical region the client addresses (not the provider's region).
    pub logical_region: String,

    /// Logical bucket name.
    pub bucket: String,

    /// Object key inside the logical bucket. May contain `/`.
    #[sqlx(rename = "object_key")]
    pub key: String,
}

impl LogicalAddress {
    pub fn new(
        env: impl Into<String>,
        logical_region: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            env: env.into(),
            logical_region: logical_region.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Key under which the object is written on the physical backend.
    ///
    /// `env/logical_region/bucket/key`. Depends only on the address so a lost
    /// metadata row can be rebuilt by deriving it again.
    pub fn physical_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.env, self.logical_region, self.bucket, self.key
        )
    }

    /// Key under which small objects are cached: `env:bucket:key`.
    ///
    /// The logical region is not part of the key, so the same env/bucket/key in
    /// two logical regions share one cache slot.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.env, self.bucket, self.key)
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.env, self.logical_region, self.bucket, self.key
        )
    }
}

/// Tier hint supplied by the caller (HOT, COLD, ARCHIVE, ...).
///
/// Only used as a routing table lookup field. Values are carried verbatim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct StorageClass(String);

impl StorageClass {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StorageClass {
    fn default() -> Self {
        Self(DEFAULT_STORAGE_CLASS.to_string())
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageClass {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StorageClass {
    fn from(value: String) -> Self {
        Self(value)
    }
}
