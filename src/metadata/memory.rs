use super::{MetadataError, MetadataResult, MetadataStore};
use crate::models::{LogicalAddress, ObjectRecord, ObjectStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Metadata store kept in process memory.
///
/// Used for local development and as the fallback when no database is
/// configured or reachable. Keeps deleted rows next to the active one so it
/// behaves like the SQL store.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: RwLock<HashMap<LogicalAddress, Vec<ObjectRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row for `address`, deleted ones included, oldest first.
    pub fn history(&self, address: &LogicalAddress) -> Vec<ObjectRecord> {
        self.rows.read().get(address).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get_active(&self, address: &LogicalAddress) -> MetadataResult<ObjectRecord> {
        self.rows
            .read()
            .get(address)
            .and_then(|rows| rows.iter().find(|row| row.is_active()))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(address.clone()))
    }

    async fn upsert(&self, mut record: ObjectRecord) -> MetadataResult<ObjectRecord> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let history = rows.entry(record.address.clone()).or_default();

        if let Some(active) = history.iter_mut().find(|row| row.is_active()) {
            record.id = active.id;
            record.version = active.version + 1;
            record.created_at = active.created_at;
            record.updated_at = now;
            record.status = ObjectStatus::Active;
            *active = record.clone();
        } else {
            record.version = 1;
            record.created_at = now;
            record.updated_at = now;
            record.status = ObjectStatus::Active;
            history.push(record.clone());
        }

        Ok(record)
    }

    async fn mark_deleted(&self, address: &LogicalAddress) -> MetadataResult<()> {
        let mut rows = self.rows.write();
        let active = rows
            .get_mut(address)
            .and_then(|history| history.iter_mut().find(|row| row.is_active()))
            .ok_or_else(|| MetadataError::NotFound(address.clone()))?;
        active.status = ObjectStatus::Deleted;
        active.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> MetadataResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackendMode, ObjectLocation, ProviderType, StorageClass};

    fn record(address: &LogicalAddress, etag: &str) -> ObjectRecord {
        ObjectRecord::new(
            address.clone(),
            ObjectLocation {
                provider_type: ProviderType::Memory,
                provider_region: String::new(),
                provider_bucket: "phys".into(),
                physical_key: address.physical_key(),
            },
            3,
            Some("text/plain".into()),
            StorageClass::default(),
            BackendMode::CacheAndBackend,
            etag.into(),
        )
    }

    #[tokio::test]
    async fn upsert_increments_version_and_keeps_created_at() {
        let store = MemoryMetadataStore::new();
        let addr = LogicalAddress::new("prod", "us", "assets", "a.txt");

        let first = store.upsert(record(&addr, "e1")).await.unwrap();
        assert_eq!(first.version, 1);

        let second = store.upsert(record(&addr, "e2")).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let active = store.get_active(&addr).await.unwrap();
        assert_eq!(active.etag, "e2");
        assert_eq!(store.history(&addr).len(), 1);
    }

    #[tokio::test]
    async fn deleted_records_are_invisible_and_rewrite_starts_over() {
        let store = MemoryMetadataStore::new();
        let addr = LogicalAddress::new("prod", "us", "assets", "a.txt");

        store.upsert(record(&addr, "e1")).await.unwrap();
        store.upsert(record(&addr, "e2")).await.unwrap();
        store.mark_deleted(&addr).await.unwrap();

        assert!(matches!(
            store.get_active(&addr).await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            store.mark_deleted(&addr).await,
            Err(MetadataError::NotFound(_))
        ));

        let fresh = store.upsert(record(&addr, "e3")).await.unwrap();
        assert_eq!(fresh.version, 1);

        let history = store.history(&addr);
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|r| r.is_active()).count(), 1);
    }

    #[tokio::test]
    async fn missing_address_is_not_found() {
        let store = MemoryMetadataStore::new();
        let addr = LogicalAddress::new("prod", "us", "assets", "nothing");
        assert!(matches!(
            store.get_active(&addr).await,
            Err(MetadataError::NotFound(_))
        ));
    }
}
