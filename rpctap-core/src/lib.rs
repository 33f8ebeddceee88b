//! # RpcTap - Transparent RPC Interception Proxy
//!
//! RpcTap sits between an RPC client and a real remote endpoint,
//! forwarding every call verbatim while recording what it sees:
//! - Transparent call forwarding with remote-reference wrapping, so
//!   follow-up calls on returned objects also route through the proxy
//! - Pluggable recorders: discard, JSONL call log, or
//!   reconstruction-script output
//! - A script generator that rebuilds recorded values as typed
//!   declarations, including nested containers and shared references
//! - Naming-service publication under the target's public name
//! - An admin channel for orderly remote shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpctap_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ProxyConfig::load("rpctap.toml")?;
//!     let server = ProxyServer::builder(config).build().await?;
//!     // Serves until EXIT arrives on the admin channel.
//!     server.serve().await
//! }
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod hook;
pub mod naming;
pub mod proxy;
pub mod record;
pub mod script;
pub mod wire;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::admin::{AdminChannel, ShutdownSignal};
    pub use crate::config::{NameEntry, ProxyConfig, RecorderConfig};
    pub use crate::error::{Result, RpcTapError};
    pub use crate::hook::{BindContext, BindHook};
    pub use crate::naming::{NameService, StaticNameService};
    pub use crate::proxy::{
        Handle, Interceptor, MemoryUpstream, ProxyServer, ProxyServerBuilder, ReferenceRegistry,
        RemoteRef, TcpUpstream, Upstream, UpstreamOutcome,
    };
    pub use crate::record::{
        Invocation, InvocationEnvelope, LogRecorder, MethodRecorder, NullRecorder, Outcome,
        ScriptRecorder, SessionLog,
    };
    pub use crate::script::{
        Access, ObjectValue, Property, PropertyKind, PropertyValue, ScriptValue,
        ScriptletGenerator,
    };
    pub use crate::wire::{RequestId, RpcFault, RpcRequest, RpcResponse};
}
