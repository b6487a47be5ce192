//! smartstore: a logical-to-physical object storage gateway.
//!
//! Clients address objects by (environment, logical region, bucket, key).
//! Per write the gateway decides whether to keep a cached copy, routes the
//! object to a physical provider bucket, and records the mapping as metadata.
//! Reads go cache → metadata → provider, refilling the cache for small objects.
//!
//! # Modules
//!
//! - [`services`] - the tiering service driving cache, provider and metadata
//! - [`storage`] - provider contract, adapters, registry and routing table
//! - [`cache`] - cache contract and the in-memory TTL cache
//! - [`metadata`] - metadata store contract, SQLite and in-memory stores
//! - [`models`] - logical addresses, physical locations, object records
//! - [`routes`] / [`handlers`] - HTTP surface

pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use services::{GatewayError, GatewayResult, TieringService};
pub use state::AppState;
