//! src/services/tiering_service.rs
//!
//! TieringService decides per write whether an object is cached, resolves
//! the physical provider for a logical address, and drives cache, backend and
//! metadata in a fixed order so the three stay as consistent as independent
//! stores allow.
//!
//! Writes:
//! - small (`0 < size <= threshold`): buffer, cache (best-effort), backend,
//!   metadata
//! - large or unsized: stream to backend, metadata
//!
//! Reads: cache, then metadata, then backend, refilling the cache for small
//! objects.
//!
//! Cache failures never fail a request. Every other failure does, with no
//! retry. A backend write followed by a failed metadata write leaves the
//! physical object behind without a record.

use crate::{
    cache::Cache,
    config::GatewayConfig,
    metadata::{MetadataError, MetadataStore},
    models::{BackendMode, LogicalAddress, ObjectLocation, ObjectRecord, StorageClass},
    storage::{
        BackendError, ByteStream, ObjectBackend, PutOptions, ProviderRegistry, RouteKey,
        RouteNotFound, RouteResult, RoutingTable, bytes_stream, collect_stream,
    },
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),
    #[error("no backend registered for provider `{0}`")]
    BackendNotRegistered(String),
    #[error("object `{0}` not found")]
    RecordNotFound(LogicalAddress),
    #[error("backend `{provider}` failed: {source}")]
    BackendIo {
        provider: String,
        #[source]
        source: BackendError,
    },
    #[error("metadata write failed: {0}")]
    MetadataWrite(#[source] MetadataError),
    #[error("metadata read failed: {0}")]
    MetadataRead(#[source] MetadataError),
    #[error("reading request body failed: {0}")]
    BodyRead(#[source] io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Tunables of the tiering decision.
#[derive(Clone, Debug)]
pub struct TieringConfig {
    /// Largest object, in bytes, that is cached.
    pub small_object_threshold: i64,
    pub cache_ttl: Duration,
    /// Applied when a request carries no storage class.
    pub default_storage_class: StorageClass,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            small_object_threshold: crate::config::DEFAULT_SMALL_OBJECT_THRESHOLD,
            cache_ttl: Duration::from_secs(crate::config::DEFAULT_CACHE_TTL_SECS),
            default_storage_class: StorageClass::default(),
        }
    }
}

impl From<&GatewayConfig> for TieringConfig {
    fn from(cfg: &GatewayConfig) -> Self {
        Self {
            small_object_threshold: cfg.cache.small_object_threshold,
            cache_ttl: cfg.cache.ttl(),
            default_storage_class: cfg.object_storage.default_storage_class.clone(),
        }
    }
}

pub struct PutRequest {
    pub address: LogicalAddress,
    pub content_type: Option<String>,
    /// Declared size in bytes; `0` (or negative) means unknown.
    pub size: i64,
    pub body: ByteStream,
    /// `None` or empty selects the configured default class.
    pub storage_class: Option<StorageClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    pub etag: String,
    pub backend: BackendMode,
    pub size: i64,
}

pub struct GetRequest {
    pub address: LogicalAddress,
}

pub struct GetResponse {
    pub size: i64,
    /// `None` when served from cache or unknown to the provider.
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Outcome of buffering a body that was declared small.
enum Buffered {
    Complete(Bytes),
    /// More than the threshold arrived; `prefix` was already read from `rest`.
    Overflow { prefix: Bytes, rest: ByteStream },
}

#[derive(Clone)]
pub struct TieringService {
    cache: Arc<dyn Cache>,
    metadata: Arc<dyn MetadataStore>,
    routes: Arc<RoutingTable>,
    providers: Arc<ProviderRegistry>,
    config: TieringConfig,
}

impl TieringService {
    pub fn new(
        cache: Arc<dyn Cache>,
        metadata: Arc<dyn MetadataStore>,
        routes: Arc<RoutingTable>,
        providers: Arc<ProviderRegistry>,
        config: TieringConfig,
    ) -> Self {
        Self {
            cache,
            metadata,
            routes,
            providers,
            config,
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    fn is_small(&self, size: i64) -> bool {
        size > 0 && size <= self.config.small_object_threshold
    }

    /// Store an object, choosing the small or large path from the declared size.
    ///
    /// The reported size is the observed byte count on the small path and the
    /// declared size on the large path. A body declared small that turns out
    /// larger than the threshold is streamed uncached, and the bytes actually
    /// streamed are reported.
    pub async fn put(&self, req: PutRequest) -> GatewayResult<PutResponse> {
        let PutRequest {
            address,
            content_type,
            size,
            body,
            storage_class,
        } = req;
        let storage_class = storage_class
            .filter(|class| !class.is_empty())
            .unwrap_or_else(|| self.config.default_storage_class.clone());

        if !self.is_small(size) {
            return self
                .put_large(address, content_type, size, body, storage_class, None)
                .await;
        }

        let limit = self.config.small_object_threshold as usize;
        match buffer_up_to(body, limit).await.map_err(GatewayError::BodyRead)? {
            Buffered::Complete(data) => {
                self.put_small(address, content_type, data, storage_class)
                    .await
            }
            Buffered::Overflow { prefix, rest } => {
                debug!(
                    "{} declared {} bytes but sent more than {}; streaming uncached",
                    address, size, limit
                );
                let streamed = Arc::new(AtomicI64::new(0));
                let counter = streamed.clone();
                let body = bytes_stream(prefix)
                    .chain(rest)
                    .inspect(move |chunk| {
                        if let Ok(chunk) = chunk {
                            counter.fetch_add(chunk.len() as i64, Ordering::Relaxed);
                        }
                    })
                    .boxed();
                self.put_large(address, content_type, 0, body, storage_class, Some(streamed))
                    .await
            }
        }
    }

    async fn put_small(
        &self,
        address: LogicalAddress,
        content_type: Option<String>,
        data: Bytes,
        storage_class: StorageClass,
    ) -> GatewayResult<PutResponse> {
        let observed = data.len() as i64;

        self.cache_best_effort(&address.cache_key(), data.clone())
            .await;

        let (route, backend) = self.resolve_backend(&address, &storage_class)?;
        let location = physical_location(&route, &address);
        let options = PutOptions {
            content_type: content_type.clone(),
            storage_class: storage_class.clone(),
        };
        let etag = backend
            .put(&location, bytes_stream(data), observed, &options)
            .await
            .map_err(|source| GatewayError::BackendIo {
                provider: route.provider_name.clone(),
                source,
            })?;

        let record = ObjectRecord::new(
            address,
            location,
            observed,
            content_type,
            storage_class,
            BackendMode::CacheAndBackend,
            etag,
        );
        self.submit_record(record, observed).await
    }

    async fn put_large(
        &self,
        address: LogicalAddress,
        content_type: Option<String>,
        size: i64,
        body: ByteStream,
        storage_class: StorageClass,
        streamed: Option<Arc<AtomicI64>>,
    ) -> GatewayResult<PutResponse> {
        let (route, backend) = self.resolve_backend(&address, &storage_class)?;
        let location = physical_location(&route, &address);
        let options = PutOptions {
            content_type: content_type.clone(),
            storage_class: storage_class.clone(),
        };
        let etag = backend
            .put(&location, body, size, &options)
            .await
            .map_err(|source| GatewayError::BackendIo {
                provider: route.provider_name.clone(),
                source,
            })?;
        let size = streamed.map_or(size, |count| count.load(Ordering::Relaxed));

        let record = ObjectRecord::new(
            address,
            location,
            size,
            content_type,
            storage_class,
            BackendMode::BackendOnly,
            etag,
        );
        self.submit_record(record, size).await
    }

    /// Fetch an object: cache first, then metadata and backend.
    pub async fn get(&self, req: GetRequest) -> GatewayResult<GetResponse> {
        let address = req.address;
        let cache_key = address.cache_key();

        match self.cache.get(&cache_key).await {
            Ok(Some(data)) if !data.is_empty() => {
                debug!("cache hit for {}", cache_key);
                return Ok(GetResponse {
                    size: data.len() as i64,
                    content_type: None,
                    body: bytes_stream(data),
                });
            }
            Ok(_) => debug!("cache miss for {}", cache_key),
            Err(err) => debug!("cache read for {} failed, treating as miss: {}", cache_key, err),
        }

        let record = match self.metadata.get_active(&address).await {
            Ok(record) => record,
            Err(MetadataError::NotFound(_)) => return Err(GatewayError::RecordNotFound(address)),
            Err(err) => return Err(GatewayError::MetadataRead(err)),
        };
        if !record.is_active() {
            return Err(GatewayError::RecordNotFound(address));
        }

        // Lookup by provider type first, then by physical bucket.
        let provider_type = record.location.provider_type.as_str();
        let (provider, backend) = match self.providers.get(provider_type) {
            Some(backend) => (provider_type.to_string(), backend),
            None => {
                let bucket = &record.location.provider_bucket;
                let backend = self
                    .providers
                    .get(bucket)
                    .ok_or_else(|| GatewayError::BackendNotRegistered(provider_type.to_string()))?;
                (bucket.clone(), backend)
            }
        };

        let object = backend
            .get(&record.location)
            .await
            .map_err(|source| GatewayError::BackendIo {
                provider: provider.clone(),
                source,
            })?;

        if !self.is_small(object.size) {
            return Ok(GetResponse {
                size: object.size,
                content_type: object.content_type,
                body: object.body,
            });
        }

        let data = collect_stream(object.body)
            .await
            .map_err(|err| GatewayError::BackendIo {
                provider,
                source: BackendError::Io(err),
            })?;
        self.cache_best_effort(&cache_key, data.clone()).await;

        Ok(GetResponse {
            size: object.size,
            content_type: object.content_type,
            body: bytes_stream(data),
        })
    }

    /// Soft-delete an object and drop its cache entry.
    ///
    /// The physical object is left on the backend.
    pub async fn delete(&self, address: &LogicalAddress) -> GatewayResult<()> {
        match self.metadata.mark_deleted(address).await {
            Ok(()) => {}
            Err(MetadataError::NotFound(_)) => {
                return Err(GatewayError::RecordNotFound(address.clone()));
            }
            Err(err) => return Err(GatewayError::MetadataWrite(err)),
        }

        let cache_key = address.cache_key();
        if let Err(err) = self.cache.delete(&cache_key).await {
            warn!("failed to drop cache entry {}: {}", cache_key, err);
        }
        Ok(())
    }

    fn resolve_backend(
        &self,
        address: &LogicalAddress,
        storage_class: &StorageClass,
    ) -> GatewayResult<(RouteResult, Arc<dyn ObjectBackend>)> {
        let route = self.routes.resolve(&RouteKey {
            env: address.env.clone(),
            logical_region: address.logical_region.clone(),
            bucket: address.bucket.clone(),
            storage_class: storage_class.clone(),
        })?;
        let backend = self
            .providers
            .get(&route.provider_name)
            .ok_or_else(|| GatewayError::BackendNotRegistered(route.provider_name.clone()))?;
        Ok((route, backend))
    }

    async fn submit_record(&self, record: ObjectRecord, size: i64) -> GatewayResult<PutResponse> {
        let etag = record.etag.clone();
        let backend = record.backend_mode;
        let location = record.location.to_string();

        if let Err(err) = self.metadata.upsert(record).await {
            warn!(
                "metadata write failed after backend write; {} has no record: {}",
                location, err
            );
            return Err(GatewayError::MetadataWrite(err));
        }

        Ok(PutResponse {
            etag,
            backend,
            size,
        })
    }

    /// Write to the cache, logging and discarding any failure.
    async fn cache_best_effort(&self, key: &str, data: Bytes) {
        if let Err(err) = self.cache.set(key, data, self.config.cache_ttl).await {
            warn!("cache write for {} failed: {}", key, err);
        }
    }
}

fn physical_location(route: &RouteResult, address: &LogicalAddress) -> ObjectLocation {
    ObjectLocation {
        provider_type: route.provider_type,
        provider_region: route.provider_region.clone(),
        provider_bucket: route.provider_bucket.clone(),
        physical_key: address.physical_key(),
    }
}

/// Read `body` into memory unless it turns out to be larger than `limit`.
async fn buffer_up_to(mut body: ByteStream, limit: usize) -> io::Result<Buffered> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
        if buf.len() > limit {
            return Ok(Buffered::Overflow {
                prefix: buf.freeze(),
                rest: body,
            });
        }
    }
    Ok(Buffered::Complete(buf.freeze()))
}
