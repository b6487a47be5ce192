use anyhow::Result;
use axum::Router;
use smartstore::{
    AppState,
    cache::MemoryCache,
    config::{AppConfig, GatewayConfig},
    metadata::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore},
    routes,
    services::{TieringConfig, TieringService},
    storage::{ProviderRegistry, RoutingTable},
};
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tracing_subscriber::EnvFilter;

/// How often expired cache entries are swept.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting smartstore gateway with config: {:?}", cfg);

    // --- Handle migration mode ---
    if migrate {
        let Some(url) = cfg.db.url.as_deref() else {
            anyhow::bail!("--migrate needs a database url");
        };
        let store = SqliteMetadataStore::connect(url).await?;
        let applied = store.apply_schema().await?;
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(()); // exit after migration
    }

    // --- Initialize collaborators ---
    let metadata = metadata_store(&cfg).await;
    let routes_table = Arc::new(RoutingTable::from_config(&cfg.object_storage));
    tracing::info!("Loaded {} routes", routes_table.len());

    let (registry, failures) = ProviderRegistry::from_config(&cfg.object_storage.providers);
    if !failures.is_empty() {
        tracing::warn!(
            "{} provider(s) unavailable; routes to them will fail",
            failures.len()
        );
    }

    let cache = Arc::new(MemoryCache::new());
    spawn_cache_purge(cache.clone());

    let service = TieringService::new(
        cache,
        metadata,
        routes_table,
        Arc::new(registry),
        TieringConfig::from(&cfg),
    );

    // --- Build router ---
    let app: Router = routes::routes().with_state(AppState::new(service, failures));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.http.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.http.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        "smartstore gateway listening on http://{} (env={})",
        listener.local_addr()?,
        cfg.env
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// SQLite when a database url is configured and reachable, memory otherwise.
async fn metadata_store(cfg: &GatewayConfig) -> Arc<dyn MetadataStore> {
    let Some(url) = cfg.db.url.as_deref() else {
        tracing::info!("no database configured, using in-memory metadata store");
        return Arc::new(MemoryMetadataStore::new());
    };

    match SqliteMetadataStore::open(url).await {
        Ok(store) => {
            tracing::info!("connected to metadata database");
            Arc::new(store)
        }
        Err(err) => {
            tracing::warn!(
                "failed to connect to {}, falling back to in-memory metadata store: {}",
                url,
                err
            );
            Arc::new(MemoryMetadataStore::new())
        }
    }
}

/// Sweep expired entries so keys that are never read again do not pile up.
fn spawn_cache_purge(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut ticker = interval(CACHE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!("purged {} expired cache entries", purged);
            }
        }
    });
}
