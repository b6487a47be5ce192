//! SQLite-backed metadata store.
//!
//! One row per object version in `objects`. A partial unique index on
//! `(env, logical_region, bucket, object_key) WHERE status = 'ACTIVE'` keeps at
//! most one active row per address; soft-deleted rows stay in the table.

use super::{MetadataError, MetadataResult, MetadataStore};
use crate::models::{LogicalAddress, ObjectRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, sync::Arc};
use tracing::debug;

/// Schema applied by `--migrate` and by [`SqliteMetadataStore::apply_schema`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const RECORD_COLUMNS: &str = "id, env, logical_region, bucket, object_key, size_bytes, \
     content_type, storage_class, store_backend, provider_type, provider_region, \
     provider_bucket, physical_key, etag, version, status, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteMetadataStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> MetadataResult<Self> {
        let db_path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                debug!("created missing directory {:?}", parent);
            }
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// [`connect`](Self::connect), then apply [`SCHEMA`] so a fresh database is
    /// usable without a separate `--migrate` run.
    pub async fn open(url: &str) -> MetadataResult<Self> {
        let store = Self::connect(url).await?;
        let applied = store.apply_schema().await?;
        debug!("applied {} schema statements", applied);
        Ok(store)
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Limited to one connection: every `sqlite::memory:` connection is its own
    /// database.
    pub async fn in_memory() -> MetadataResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(Arc::new(pool));
        store.apply_schema().await?;
        Ok(store)
    }

    /// Run every statement of [`SCHEMA`]. Idempotent.
    pub async fn apply_schema(&self) -> MetadataResult<usize> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get_active(&self, address: &LogicalAddress) -> MetadataResult<ObjectRecord> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM objects
             WHERE env = ? AND logical_region = ? AND bucket = ? AND object_key = ?
               AND status = 'ACTIVE'"
        );
        sqlx::query_as::<_, ObjectRecord>(&sql)
            .bind(&address.env)
            .bind(&address.logical_region)
            .bind(&address.bucket)
            .bind(&address.key)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| MetadataError::NotFound(address.clone()))
    }

    async fn upsert(&self, record: ObjectRecord) -> MetadataResult<ObjectRecord> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO objects ({RECORD_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 'ACTIVE', ?, ?)
            ON CONFLICT (env, logical_region, bucket, object_key) WHERE status = 'ACTIVE'
            DO UPDATE SET
                size_bytes = excluded.size_bytes,
                content_type = excluded.content_type,
                storage_class = excluded.storage_class,
                store_backend = excluded.store_backend,
                provider_type = excluded.provider_type,
                provider_region = excluded.provider_region,
                provider_bucket = excluded.provider_bucket,
                physical_key = excluded.physical_key,
                etag = excluded.etag,
                version = objects.version + 1,
                updated_at = excluded.updated_at
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let stored = sqlx::query_as::<_, ObjectRecord>(&sql)
            .bind(record.id)
            .bind(&record.address.env)
            .bind(&record.address.logical_region)
            .bind(&record.address.bucket)
            .bind(&record.address.key)
            .bind(record.size_bytes)
            .bind(&record.content_type)
            .bind(&record.storage_class)
            .bind(record.backend_mode)
            .bind(record.location.provider_type)
            .bind(&record.location.provider_region)
            .bind(&record.location.provider_bucket)
            .bind(&record.location.physical_key)
            .bind(&record.etag)
            .bind(now)
            .bind(now)
            .fetch_one(&*self.db)
            .await?;

        Ok(stored)
    }

    async fn mark_deleted(&self, address: &LogicalAddress) -> MetadataResult<()> {
        let result = sqlx::query(
            "UPDATE objects SET status = 'DELETED', updated_at = ?
             WHERE env = ? AND logical_region = ? AND bucket = ? AND object_key = ?
               AND status = 'ACTIVE'",
        )
        .bind(Utc::now())
        .bind(&address.env)
        .bind(&address.logical_region)
        .bind(&address.bucket)
        .bind(&address.key)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(address.clone()));
        }
        Ok(())
    }

    async fn ping(&self) -> MetadataResult<()> {
        // Touches `objects` so a database without the schema is not ready.
        let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM objects")
            .fetch_one(&*self.db)
            .await?;
        debug!("metadata ping saw {} rows", rows);
        Ok(())
    }
}
