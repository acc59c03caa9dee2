//! Per-identity Postgres client manager.
//!
//! Maintains a two-level mapping `identity_hash -> database_name ->
//! pooled_client`, plus `identity_hash -> currently_selected_database_name`.
//! No identity ever observes an uninitialized client: connect and metadata
//! load must both succeed before a client is published.

use crate::error::{DbError, DbResult};
use crate::pool::PooledClient;
use pgmcp_core::DatabaseConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct ManagerState {
    /// identity_hash -> database_name -> client
    clients: HashMap<String, HashMap<String, Arc<PooledClient>>>,
    /// identity_hash -> currently selected database name
    selected: HashMap<String, String>,
    /// database_name -> connection string, the current configuration
    databases: HashMap<String, String>,
    default_database: Option<String>,
}

/// Owns every pooled client in the process. Callers receive shared handles;
/// only the manager may close a pool.
pub struct ClientManager {
    state: RwLock<ManagerState>,
}

impl ClientManager {
    pub fn new(configs: &[DatabaseConfig]) -> Self {
        let mut databases = HashMap::new();
        let mut default_database = None;
        for db in configs {
            if db.is_default || default_database.is_none() {
                default_database = Some(db.name.clone());
            }
            databases.insert(db.name.clone(), db.connection_string.clone());
        }
        Self {
            state: RwLock::new(ManagerState {
                clients: HashMap::new(),
                selected: HashMap::new(),
                databases,
                default_database,
            }),
        }
    }

    fn check_identity(identity_hash: &str) -> DbResult<()> {
        if identity_hash.is_empty() {
            return Err(DbError::EmptyIdentity);
        }
        Ok(())
    }

    /// Returns the client for `identity_hash`'s currently selected database
    /// (or the configured default if none has been selected yet), creating
    /// and initializing it if absent.
    pub async fn get_client(&self, identity_hash: &str) -> DbResult<Arc<PooledClient>> {
        Self::check_identity(identity_hash)?;
        let database = {
            let state = self.state.read().await;
            state
                .selected
                .get(identity_hash)
                .cloned()
                .or_else(|| state.default_database.clone())
                .ok_or_else(|| DbError::UnknownDatabase(String::new()))?
        };
        self.get_client_for_database(identity_hash, &database).await
    }

    /// Returns the client for `identity_hash` scoped to `db_name`, creating
    /// and initializing it if absent. Double-checked under the write lock
    /// so exactly one construction happens per (identity, database) pair
    /// under contention.
    pub async fn get_client_for_database(&self, identity_hash: &str, db_name: &str) -> DbResult<Arc<PooledClient>> {
        Self::check_identity(identity_hash)?;

        if let Some(client) = self.lookup(identity_hash, db_name).await {
            return Ok(client);
        }

        let connection_string = {
            let state = self.state.read().await;
            state
                .databases
                .get(db_name)
                .cloned()
                .ok_or_else(|| DbError::UnknownDatabase(db_name.to_string()))?
        };

        let state = self.state.write().await;
        // Double-checked: another task may have won the race while we
        // connected without holding the write lock.
        if let Some(client) = state
            .clients
            .get(identity_hash)
            .and_then(|per_db| per_db.get(db_name))
        {
            return Ok(client.clone());
        }
        drop(state);

        let client = Arc::new(PooledClient::connect(db_name.to_string(), &connection_string).await?);

        let mut state = self.state.write().await;
        if let Some(existing) = state
            .clients
            .get(identity_hash)
            .and_then(|per_db| per_db.get(db_name))
        {
            client.close();
            return Ok(existing.clone());
        }
        state
            .clients
            .entry(identity_hash.to_string())
            .or_default()
            .insert(db_name.to_string(), client.clone());
        Ok(client)
    }

    async fn lookup(&self, identity_hash: &str, db_name: &str) -> Option<Arc<PooledClient>> {
        let state = self.state.read().await;
        state.clients.get(identity_hash)?.get(db_name).cloned()
    }

    /// Sets `identity_hash`'s currently selected database. Happens-before
    /// any subsequent `get_client` call for the same identity.
    pub async fn select_database(&self, identity_hash: &str, db_name: &str) -> DbResult<()> {
        Self::check_identity(identity_hash)?;
        {
            let state = self.state.read().await;
            if !state.databases.contains_key(db_name) {
                return Err(DbError::UnknownDatabase(db_name.to_string()));
            }
        }
        let mut state = self.state.write().await;
        state.selected.insert(identity_hash.to_string(), db_name.to_string());
        Ok(())
    }

    /// Like [`select_database`](Self::select_database), additionally
    /// closing and evicting the identity's clients for every other
    /// database, preventing unbounded pool accumulation on single-session
    /// transports.
    pub async fn select_database_and_close_others(&self, identity_hash: &str, db_name: &str) -> DbResult<()> {
        self.select_database(identity_hash, db_name).await?;
        let mut state = self.state.write().await;
        if let Some(per_db) = state.clients.get_mut(identity_hash) {
            let mut to_close = Vec::new();
            per_db.retain(|name, client| {
                if name == db_name {
                    true
                } else {
                    to_close.push(client.clone());
                    false
                }
            });
            drop(state);
            for client in to_close {
                client.close();
            }
        }
        Ok(())
    }

    /// Diffs `new_configs` against the current set. Every removed database
    /// has its pooled clients closed and evicted; identities that had it
    /// selected are redirected to the new default.
    pub async fn update_configs(&self, new_configs: &[DatabaseConfig]) {
        let mut new_databases = HashMap::new();
        let mut new_default = None;
        for db in new_configs {
            if db.is_default || new_default.is_none() {
                new_default = Some(db.name.clone());
            }
            new_databases.insert(db.name.clone(), db.connection_string.clone());
        }

        let mut state = self.state.write().await;
        let removed: Vec<String> = state
            .databases
            .keys()
            .filter(|name| !new_databases.contains_key(*name))
            .cloned()
            .collect();

        let mut to_close = Vec::new();
        for per_db in state.clients.values_mut() {
            for name in &removed {
                if let Some(client) = per_db.remove(name) {
                    to_close.push(client);
                }
            }
        }
        for selected in state.selected.values_mut() {
            if removed.contains(selected) {
                if let Some(default) = &new_default {
                    *selected = default.clone();
                }
            }
        }

        state.databases = new_databases;
        state.default_database = new_default;
        drop(state);

        for client in to_close {
            client.close();
        }
    }

    /// Closes and evicts all clients for `identity_hash`.
    pub async fn remove_client(&self, identity_hash: &str) {
        self.remove_clients(std::slice::from_ref(&identity_hash.to_string())).await;
    }

    /// Closes and evicts all clients for every identity in `identity_hashes`.
    pub async fn remove_clients(&self, identity_hashes: &[String]) {
        let mut state = self.state.write().await;
        let mut to_close = Vec::new();
        for identity in identity_hashes {
            if let Some(per_db) = state.clients.remove(identity) {
                to_close.extend(per_db.into_values());
            }
            state.selected.remove(identity);
        }
        drop(state);
        for client in to_close {
            client.close();
        }
    }

    /// Drains every pooled client on shutdown.
    pub async fn close_all(&self) {
        let mut state = self.state.write().await;
        let all: Vec<Arc<PooledClient>> = state.clients.drain().flat_map(|(_, per_db)| per_db.into_values()).collect();
        state.selected.clear();
        drop(state);
        for client in all {
            client.close();
        }
    }
}
