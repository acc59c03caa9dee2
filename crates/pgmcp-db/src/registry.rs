//! Context-aware resource registry: routes protocol `resources/read`
//! requests to a per-URI handler scoped by caller identity.

use crate::error::DbError;
use crate::manager::ClientManager;
use crate::pool::PooledClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identity derived from a request context: either an opaque token hash or
/// the sentinel used when the transport disables authentication.
pub const DEFAULT_IDENTITY: &str = "default";

/// Request-scoped context carrying the caller's identity and a
/// cancellation handle for the I/O this read performs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity_hash: String,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(identity_hash: Option<String>) -> Self {
        Self {
            identity_hash: identity_hash.unwrap_or_else(|| DEFAULT_IDENTITY.to_string()),
            cancel: CancellationToken::new(),
        }
    }
}

/// Declared media type for a resource's serialized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Json,
    Tsv,
}

/// Static description of a registered resource, returned by `list`.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub media_type: MediaType,
}

/// Result of a `read` call: either a serialized body or a structured error
/// that never propagates as an exception out of the registry.
#[derive(Debug, Clone)]
pub enum ResourceContent {
    Body { media_type: MediaType, data: String },
    Error { message: String },
}

/// Filters `list`/`read` results to the subset an identity may observe.
#[async_trait]
pub trait PolicyChecker: Send + Sync {
    async fn can_read(&self, identity_hash: &str, uri: &str) -> bool;
}

/// A per-URI handler for a SQL-backed resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn descriptor(&self) -> ResourceDescriptor;

    /// Runs the handler's query against `client` and serializes the rows.
    async fn handle(&self, client: &PooledClient, cancel: &CancellationToken) -> ResourceContent;
}

/// Routes `read` requests to the correct database client under
/// identity-scoping rules, with optional access-control filtering.
pub struct Registry {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
    client_manager: Arc<ClientManager>,
    policy: Option<Arc<dyn PolicyChecker>>,
}

impl Registry {
    pub fn new(client_manager: Arc<ClientManager>) -> Self {
        Self {
            handlers: HashMap::new(),
            client_manager,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PolicyChecker>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(handler.descriptor().uri.clone(), handler);
    }

    /// Lists every registered resource, filtered by the policy checker for
    /// `identity_hash` if one is configured.
    pub async fn list(&self, identity_hash: &str) -> Vec<ResourceDescriptor> {
        let mut descriptors = Vec::new();
        for handler in self.handlers.values() {
            let descriptor = handler.descriptor();
            if self.is_allowed(identity_hash, &descriptor.uri).await {
                descriptors.push(descriptor);
            }
        }
        descriptors
    }

    /// Reads a single resource on behalf of `context`. Any failure —
    /// unknown URI, denied by policy, client/query error — returns a
    /// structured [`ResourceContent::Error`], never an exception.
    pub async fn read(&self, context: &RequestContext, uri: &str) -> ResourceContent {
        if !self.is_allowed(&context.identity_hash, uri).await {
            return ResourceContent::Error {
                message: format!("access denied for resource '{uri}'"),
            };
        }

        let Some(handler) = self.handlers.get(uri) else {
            return ResourceContent::Error {
                message: format!("unknown resource '{uri}'"),
            };
        };

        let client = match self.client_manager.get_client(&context.identity_hash).await {
            Ok(client) => client,
            Err(err) => return Self::client_error(err),
        };

        if let Err(err) = client.metadata() {
            return Self::client_error(err);
        }

        handler.handle(&client, &context.cancel).await
    }

    async fn is_allowed(&self, identity_hash: &str, uri: &str) -> bool {
        match &self.policy {
            Some(policy) => policy.can_read(identity_hash, uri).await,
            None => true,
        }
    }

    fn client_error(err: DbError) -> ResourceContent {
        ResourceContent::Error {
            message: err.to_string(),
        }
    }
}

/// Serializes rows into an indented JSON array of objects, one per row,
/// using `columns` to label each value.
pub fn rows_to_json(rows: &[tokio_postgres::Row], columns: &[&str]) -> String {
    let values: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, col) in columns.iter().enumerate() {
                let value: Option<String> = row.try_get(i).ok();
                obj.insert((*col).to_string(), serde_json::Value::String(value.unwrap_or_default()));
            }
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::to_string_pretty(&values).unwrap_or_else(|_| "[]".to_string())
}

/// Serializes rows as tab-separated values with a header row.
pub fn rows_to_tsv(rows: &[tokio_postgres::Row], columns: &[&str]) -> String {
    let mut out = columns.join("\t");
    out.push('\n');
    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, _)| row.try_get::<_, Option<String>>(i).ok().flatten().unwrap_or_default())
            .collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgmcp_core::DatabaseConfig;

    struct AlwaysDeny;

    #[async_trait]
    impl PolicyChecker for AlwaysDeny {
        async fn can_read(&self, _identity_hash: &str, _uri: &str) -> bool {
            false
        }
    }

    struct NoopHandler;

    #[async_trait]
    impl ResourceHandler for NoopHandler {
        fn descriptor(&self) -> ResourceDescriptor {
            ResourceDescriptor {
                uri: "pg://tables".to_string(),
                name: "tables".to_string(),
                description: "lists tables".to_string(),
                media_type: MediaType::Json,
            }
        }

        async fn handle(&self, _client: &PooledClient, _cancel: &CancellationToken) -> ResourceContent {
            ResourceContent::Body {
                media_type: MediaType::Json,
                data: "[]".to_string(),
            }
        }
    }

    fn manager() -> Arc<ClientManager> {
        Arc::new(ClientManager::new(&[DatabaseConfig {
            name: "main".to_string(),
            connection_string: "postgres://localhost/main".to_string(),
            is_default: true,
        }]))
    }

    #[tokio::test]
    async fn test_list_without_policy_returns_all() {
        let mut registry = Registry::new(manager());
        registry.register(Arc::new(NoopHandler));
        let descriptors = registry.list(DEFAULT_IDENTITY).await;
        assert_eq!(descriptors.len(), 1);
    }

    #[tokio::test]
    async fn test_policy_denies_are_filtered() {
        let mut registry = Registry::new(manager()).with_policy(Arc::new(AlwaysDeny));
        registry.register(Arc::new(NoopHandler));
        let descriptors = registry.list(DEFAULT_IDENTITY).await;
        assert!(descriptors.is_empty());
    }

    #[tokio::test]
    async fn test_read_unknown_uri_returns_structured_error() {
        let registry = Registry::new(manager());
        let context = RequestContext::new(None);
        let result = registry.read(&context, "pg://nonexistent").await;
        assert!(matches!(result, ResourceContent::Error { .. }));
    }

    #[tokio::test]
    async fn test_read_denied_by_policy_returns_structured_error() {
        let mut registry = Registry::new(manager()).with_policy(Arc::new(AlwaysDeny));
        registry.register(Arc::new(NoopHandler));
        let context = RequestContext::new(None);
        let result = registry.read(&context, "pg://tables").await;
        assert!(matches!(result, ResourceContent::Error { .. }));
    }
}
