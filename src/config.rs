use crate::models::{ProviderType, StorageClass};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

/// Objects of at most this many bytes are cached (1 MiB).
pub const DEFAULT_SMALL_OBJECT_THRESHOLD: i64 = 1024 * 1024;

/// How long cached small objects live (24 h).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Centralized gateway configuration.
/// Loaded from a YAML file, then overridden by environment variables and CLI
/// arguments (CLI wins).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment this gateway instance runs in. Informational.
    pub env: String,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub db: DbConfig,
    pub object_storage: ObjectStorageConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            env: "dev".into(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            db: DbConfig::default(),
            object_storage: ObjectStorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub small_object_threshold: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            small_object_threshold: DEFAULT_SMALL_OBJECT_THRESHOLD,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Metadata database. Without a URL the in-memory store is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub default_storage_class: StorageClass,
    pub routes: Vec<RouteRule>,
    pub providers: Vec<ProviderConfig>,
}

/// One routing table row: an exact logical key and the provider serving it.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    pub env: String,
    pub logical_region: String,
    pub bucket: String,
    pub storage_class: StorageClass,
    /// Reference to `providers[*].name`.
    pub provider_name: String,
    pub provider_bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Logical name, referenced by routes and used as the registry key.
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub region: String,
    /// Root directory for `LOCAL_FS` providers.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl GatewayConfig {
    /// Parse a gateway YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut cfg: Self = serde_yaml::from_str(raw).context("parsing gateway config")?;
        if cfg.object_storage.default_storage_class.is_empty() {
            cfg.object_storage.default_storage_class = StorageClass::default();
        }
        Ok(cfg)
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading gateway config `{}`", path))?;
        Self::from_yaml_str(&raw)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Tiering object storage gateway")]
pub struct Args {
    /// Path to the gateway YAML file (overrides SMARTSTORE_CONFIG)
    #[arg(long)]
    pub config: Option<String>,

    /// Host to bind to (overrides SMARTSTORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SMARTSTORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Metadata database URL (overrides SMARTSTORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

pub struct AppConfig;

impl AppConfig {
    /// Parse the config file, environment variables and CLI args into a
    /// GatewayConfig and the migrate flag.
    pub fn from_env_and_args() -> Result<(GatewayConfig, bool)> {
        let args = Args::parse();

        // --- Config file ---
        let path = args
            .config
            .clone()
            .or_else(|| env::var("SMARTSTORE_CONFIG").ok());
        let mut cfg = match path {
            Some(path) => GatewayConfig::load(&path)?,
            None => {
                tracing::warn!("no gateway config file given; starting with defaults and no routes");
                GatewayConfig::default()
            }
        };

        // --- Environment overrides ---
        if let Ok(host) = env::var("SMARTSTORE_HOST") {
            cfg.http.host = host;
        }
        match env::var("SMARTSTORE_PORT") {
            Ok(value) => {
                cfg.http.port = value
                    .parse::<u16>()
                    .with_context(|| format!("parsing SMARTSTORE_PORT value `{}`", value))?;
            }
            Err(env::VarError::NotPresent) => {}
            Err(err) => return Err(err).context("reading SMARTSTORE_PORT"),
        }
        if let Ok(url) = env::var("SMARTSTORE_DATABASE_URL") {
            cfg.db.url = Some(url);
        }

        // --- CLI overrides ---
        if let Some(host) = args.host {
            cfg.http.host = host;
        }
        if let Some(port) = args.port {
            cfg.http.port = port;
        }
        if let Some(url) = args.database_url {
            cfg.db.url = Some(url);
        }

        Ok((cfg, args.migrate))
    }
}
