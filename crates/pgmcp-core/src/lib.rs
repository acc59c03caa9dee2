//! Core compaction engine for the postgres-mcp-gateway.
//!
//! This crate provides the central coordination layer for the gateway:
//! - Chat message model shared by the protocol and compactor
//! - Token estimation parameterized by provider profile
//! - Single-message importance classification
//! - Deterministic summarization of dropped message slices
//! - A reader/writer-guarded compaction result cache
//! - Per-call analytics recording
//! - The compactor orchestrator tying the above together
//! - Gateway configuration (database list, compaction defaults)

pub mod analytics;
pub mod cache;
pub mod classify;
pub mod compactor;
pub mod config;
pub mod error;
pub mod estimate;
pub mod message;
pub mod summarize;

pub use analytics::{AnalyticsRecord, AnalyticsTracker};
pub use cache::{cache_key, CacheEntry, CompactionCache};
pub use classify::{Class, Classification, Classifier};
pub use compactor::{CompactionInfo, CompactionOptions, CompactionRequest, CompactionResponse, Compactor};
pub use config::{CompactionDefaults, Config, DatabaseConfig};
pub use error::{CoreError, CoreResult};
pub use estimate::{ProviderProfile, TokenEstimator};
pub use message::{Block, Message, MessageContent, Role, TextBlock, ToolResultContent};
pub use summarize::{summarize_basic, summarize_enhanced, Summary};
