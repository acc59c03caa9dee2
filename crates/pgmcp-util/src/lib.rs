//! Shared utilities for the postgres-mcp-gateway workspace.
//!
//! - Content-addressed fingerprinting for cache keys
//! - Logging setup with tracing

pub mod fingerprint;
pub mod log;

pub use fingerprint::fingerprint;
