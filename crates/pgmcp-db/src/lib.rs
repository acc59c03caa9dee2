//! Per-identity Postgres client manager and context-aware resource
//! registry for pg-mcp-gateway.

pub mod error;
pub mod manager;
pub mod pool;
pub mod registry;

pub use error::{DbError, DbResult};
pub use manager::ClientManager;
pub use pool::{ClientMetadata, PooledClient};
pub use registry::{
    MediaType, PolicyChecker, RequestContext, ResourceContent, ResourceDescriptor, ResourceHandler, Registry,
    DEFAULT_IDENTITY,
};
