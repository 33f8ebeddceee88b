//! Interception proxy
//!
//! The proxy sits between a caller and the real remote endpoint: it
//! resolves the target through the naming service, republishes itself
//! under the target's name, forwards every call verbatim, wraps
//! remote-object references returned by the target so follow-up calls
//! route back through the proxy, and reports each completed call to
//! the configured recorder.

mod interceptor;
mod registry;
mod server;
mod upstream;

pub use interceptor::Interceptor;
pub use registry::{Handle, ReferenceRegistry, RemoteRef};
pub use server::{ProxyServer, ProxyServerBuilder};
pub use upstream::{MemoryUpstream, TcpUpstream, Upstream, UpstreamOutcome};
