//! Metadata store contract.
//!
//! A store owns [`ObjectRecord`]s once they are submitted: it assigns versions
//! and timestamps on upsert and soft-deletes on request. Deleted rows stay in
//! the store but are invisible to [`MetadataStore::get_active`].

pub mod memory;
pub mod sqlite;

use crate::models::{LogicalAddress, ObjectRecord};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no active record for `{0}`")]
    NotFound(LogicalAddress),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// The active record for `address`, or `NotFound`.
    async fn get_active(&self, address: &LogicalAddress) -> MetadataResult<ObjectRecord>;

    /// Insert `record`, or overwrite the active record for the same address.
    ///
    /// On overwrite the stored version grows by one, `updated_at` is refreshed
    /// and `created_at` is kept. Returns the record as stored.
    async fn upsert(&self, record: ObjectRecord) -> MetadataResult<ObjectRecord>;

    /// Flip the active record for `address` to deleted.
    async fn mark_deleted(&self, address: &LogicalAddress) -> MetadataResult<()>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> MetadataResult<()>;
}
