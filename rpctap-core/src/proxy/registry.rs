//! Handle allocation and remote-reference lookup
//!
//! The registry is the single source of truth for "what intercepted
//! object does this handle mean". The root object lives under the
//! reserved empty handle; every nested remote reference the proxy
//! wraps gets exactly one entry here for the lifetime of the proxy.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, RpcTapError};

/// Opaque identifier for a remote-object instance known to the proxy.
///
/// The empty string is reserved for the root object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(s: impl Into<String>) -> Self {
        Handle(s.into())
    }

    /// The reserved handle denoting the originally looked-up root object.
    pub fn root() -> Self {
        Handle(String::new())
    }

    /// Mint a fresh unique handle.
    pub fn fresh() -> Self {
        Handle(Uuid::new_v4().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A live reference to an object on the real endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Handle the upstream endpoint knows this object by. Empty for
    /// the root object, which upstream addresses implicitly.
    pub upstream_handle: String,
    /// Human-readable name, used in log lines only.
    pub display_name: String,
}

impl RemoteRef {
    pub fn root(display_name: impl Into<String>) -> Self {
        Self {
            upstream_handle: String::new(),
            display_name: display_name.into(),
        }
    }

    pub fn new(upstream_handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            upstream_handle: upstream_handle.into(),
            display_name: display_name.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.upstream_handle.is_empty()
    }
}

/// Concurrent handle-to-reference mapping shared by all in-flight calls.
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    entries: RwLock<HashMap<Handle, RemoteRef>>,
}

impl ReferenceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install `reference` under the reserved root handle.
    ///
    /// Re-calling overwrites: last write wins, no merge semantics.
    pub async fn register_root(&self, reference: RemoteRef) {
        let mut entries = self.entries.write().await;
        entries.insert(Handle::root(), reference);
    }

    /// Install `reference` under an explicit handle, returning the
    /// handle for chaining. Overwrites silently if the handle exists.
    pub async fn register(&self, handle: Handle, reference: RemoteRef) -> Handle {
        let mut entries = self.entries.write().await;
        entries.insert(handle.clone(), reference);
        handle
    }

    /// Look up the reference behind `handle`.
    ///
    /// Unknown handles fail explicitly; there is no default.
    pub async fn resolve(&self, handle: &Handle) -> Result<RemoteRef> {
        let entries = self.entries.read().await;
        entries
            .get(handle)
            .cloned()
            .ok_or_else(|| RpcTapError::UnknownHandle(handle.to_string()))
    }

    /// Return the handle already assigned to the same underlying
    /// upstream object, or mint and register a fresh one. Reverse
    /// check and insert happen under one write lock, so concurrent
    /// wrappers of the same reference always agree on a single handle.
    pub async fn register_or_existing(&self, reference: RemoteRef) -> Handle {
        let mut entries = self.entries.write().await;
        if !reference.is_root() {
            if let Some(existing) = entries
                .iter()
                .find(|(_, r)| r.upstream_handle == reference.upstream_handle)
                .map(|(h, _)| h.clone())
            {
                return existing;
            }
        }
        let handle = Handle::fresh();
        tracing::debug!(
            upstream = %reference.upstream_handle,
            handle = %handle,
            "Wrapping returned remote reference"
        );
        entries.insert(handle.clone(), reference);
        handle
    }

    /// Number of registered references, root included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
