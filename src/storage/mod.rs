//! Physical storage: the provider contract, shipped adapters, the provider
//! registry and the routing table that picks a provider per logical key.

pub mod backend;
pub mod filesystem;
pub mod memory;
pub mod registry;
pub mod router;

pub use backend::{
    BackendError, BackendObject, BackendResult, ByteStream, ObjectBackend, PutOptions,
    bytes_stream, collect_stream,
};
pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use registry::{ProviderInitFailure, ProviderRegistry};
pub use router::{RouteKey, RouteNotFound, RouteResult, RoutingTable};
