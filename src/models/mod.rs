//! Core data models for the tiering gateway.
//!
//! These types describe how a logical object (what clients address) maps to a
//! physical one (what a provider stores). They map to the metadata table via
//! `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod address;
pub mod location;
pub mod object;

pub use address::{DEFAULT_STORAGE_CLASS, LogicalAddress, StorageClass};
pub use location::{ObjectLocation, ProviderType};
pub use object::{BackendMode, ObjectRecord, ObjectStatus};
