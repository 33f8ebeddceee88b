//! Naming service interface
//!
//! External collaborator: the proxy uses it to locate the real target
//! at startup and to publish (and later retract) its own endpoint
//! under a public name.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, RpcTapError};

/// Lookup/publish contract the proxy needs from a naming service.
#[async_trait]
pub trait NameService: Send + Sync {
    /// Resolve `name` to an endpoint address.
    async fn lookup(&self, name: &str) -> Result<SocketAddr>;

    /// Publish `addr` under `name`, replacing any previous binding.
    async fn bind(&self, name: &str, addr: SocketAddr) -> Result<()>;

    /// Retract the binding for `name`. Unbinding an unknown name is
    /// tolerated.
    async fn unbind(&self, name: &str) -> Result<()>;
}

/// Config-driven naming table.
#[derive(Debug, Default)]
pub struct StaticNameService {
    table: RwLock<HashMap<String, SocketAddr>>,
}

impl StaticNameService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (String, SocketAddr)>) -> Self {
        Self {
            table: RwLock::new(entries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl NameService for StaticNameService {
    async fn lookup(&self, name: &str) -> Result<SocketAddr> {
        let table = self.table.read().await;
        table
            .get(name)
            .copied()
            .ok_or_else(|| RpcTapError::NameNotFound(name.to_string()))
    }

    async fn bind(&self, name: &str, addr: SocketAddr) -> Result<()> {
        let mut table = self.table.write().await;
        table.insert(name.to_string(), addr);
        Ok(())
    }

    async fn unbind(&self, name: &str) -> Result<()> {
        let mut table = self.table.write().await;
        if table.remove(name).is_none() {
            tracing::debug!("Unbind of unknown name: {name}");
        }
        Ok(())
    }
}
