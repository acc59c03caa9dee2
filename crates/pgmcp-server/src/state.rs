//! Shared state threaded through both transports.

use pgmcp_core::{AnalyticsTracker, CompactionCache, Compactor, Config};
use pgmcp_db::{ClientManager, Registry};
use std::sync::Arc;

/// Everything a dispatch call needs to answer a JSON-RPC request.
#[derive(Clone)]
pub struct GatewayState {
    pub name: String,
    pub version: String,
    pub config: Arc<Config>,
    pub compactor: Arc<Compactor>,
    pub client_manager: Arc<ClientManager>,
    pub registry: Arc<Registry>,
    pub api_key: Option<String>,
}

impl GatewayState {
    pub fn new(name: impl Into<String>, version: impl Into<String>, config: Config) -> Self {
        let client_manager = Arc::new(ClientManager::new(&config.databases));
        let registry = Arc::new(Registry::new(client_manager.clone()));
        let api_key = config.api_key.clone();

        let mut compactor = Compactor::new();
        if config.compaction.options.enable_caching {
            let ttl = if config.compaction.options.cache_ttl == 0 {
                None
            } else {
                Some(std::time::Duration::from_secs(config.compaction.options.cache_ttl))
            };
            compactor = compactor.with_cache(Arc::new(CompactionCache::new(ttl)));
        }
        if config.compaction.options.enable_analytics {
            compactor = compactor.with_analytics(Arc::new(AnalyticsTracker::new()));
        }

        Self {
            name: name.into(),
            version: version.into(),
            config: Arc::new(config),
            compactor: Arc::new(compactor),
            client_manager,
            registry,
            api_key,
        }
    }

    pub fn has_auth(&self) -> bool {
        self.api_key.is_some()
    }
}
