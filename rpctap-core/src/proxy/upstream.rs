//! Upstream endpoint clients
//!
//! The proxy talks to the real endpoint through the [`Upstream`]
//! capability. A transport failure reaching the endpoint is an
//! infrastructure error; a fault the endpoint itself raised is a
//! normal outcome that passes through the proxy unchanged.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{Result, RpcTapError};
use crate::proxy::Handle;
use crate::wire::{RpcFault, RpcRequest, RpcResponse};

/// Outcome of a forwarded call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Returned(Value),
    Fault(RpcFault),
}

/// Client-side view of the real endpoint.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Invoke `method` with `params` against the object upstream knows
    /// as `object` (`None` = the implicit root object).
    async fn call(
        &self,
        object: Option<&str>,
        method: &str,
        params: Option<Value>,
    ) -> Result<UpstreamOutcome>;
}

/// Newline-delimited JSON-RPC over TCP, one connection per call.
pub struct TcpUpstream {
    addr: SocketAddr,
    next_id: AtomicI64,
}

impl TcpUpstream {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Upstream for TcpUpstream {
    async fn call(
        &self,
        object: Option<&str>,
        method: &str,
        params: Option<Value>,
    ) -> Result<UpstreamOutcome> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut request = RpcRequest::new(id, method);
        if let Some(handle) = object {
            request = request.with_object(&Handle::new(handle));
        }
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|e| RpcTapError::Transport(format!("connect {}: {e}", self.addr)))?;
        let (read_half, mut write_half) = stream.into_split();

        let line = serde_json::to_string(&request)?;
        write_half
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| RpcTapError::Transport(format!("write to {}: {e}", self.addr)))?;
        write_half
            .flush()
            .await
            .map_err(|e| RpcTapError::Transport(format!("flush to {}: {e}", self.addr)))?;

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        let n = reader
            .read_line(&mut reply)
            .await
            .map_err(|e| RpcTapError::Transport(format!("read from {}: {e}", self.addr)))?;
        if n == 0 {
            return Err(RpcTapError::Transport(format!(
                "connection to {} closed before reply",
                self.addr
            )));
        }

        let response: RpcResponse = serde_json::from_str(reply.trim())?;
        match (response.result, response.error) {
            (_, Some(fault)) => Ok(UpstreamOutcome::Fault(fault)),
            (Some(value), None) => Ok(UpstreamOutcome::Returned(value)),
            (None, None) => Ok(UpstreamOutcome::Returned(Value::Null)),
        }
    }
}

/// Scripted in-memory endpoint for tests.
///
/// Responses are keyed by `(object, method)`; unscripted calls fault
/// with "method not found".
#[derive(Debug, Default)]
pub struct MemoryUpstream {
    responses: HashMap<(Option<String>, String), UpstreamOutcome>,
    calls: std::sync::Mutex<Vec<(Option<String>, String, Option<Value>)>>,
}

impl MemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful return for `method` on the root object.
    pub fn returns(mut self, method: impl Into<String>, value: Value) -> Self {
        self.responses
            .insert((None, method.into()), UpstreamOutcome::Returned(value));
        self
    }

    /// Script a successful return for `method` on a nested object.
    pub fn object_returns(
        mut self,
        object: impl Into<String>,
        method: impl Into<String>,
        value: Value,
    ) -> Self {
        self.responses.insert(
            (Some(object.into()), method.into()),
            UpstreamOutcome::Returned(value),
        );
        self
    }

    /// Script a fault for `method` on the root object.
    pub fn faults(mut self, method: impl Into<String>, fault: RpcFault) -> Self {
        self.responses
            .insert((None, method.into()), UpstreamOutcome::Fault(fault));
        self
    }

    /// Every call observed so far, in order.
    pub fn calls(&self) -> Vec<(Option<String>, String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for MemoryUpstream {
    async fn call(
        &self,
        object: Option<&str>,
        method: &str,
        params: Option<Value>,
    ) -> Result<UpstreamOutcome> {
        self.calls.lock().unwrap().push((
            object.map(|s| s.to_string()),
            method.to_string(),
            params,
        ));

        let key = (object.map(|s| s.to_string()), method.to_string());
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| {
                UpstreamOutcome::Fault(RpcFault::new(-32601, format!("Method not found: {method}")))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upstream_scripted_return() {
        let upstream = MemoryUpstream::new().returns("ping", serde_json::json!("pong"));
        let outcome = upstream.call(None, "ping", None).await.unwrap();
        assert_eq!(outcome, UpstreamOutcome::Returned(serde_json::json!("pong")));
    }

    #[tokio::test]
    async fn test_memory_upstream_records_calls() {
        let upstream = MemoryUpstream::new().returns("echo", Value::Null);
        upstream
            .call(None, "echo", Some(serde_json::json!([1])))
            .await
            .unwrap();

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "echo");
        assert_eq!(calls[0].2, Some(serde_json::json!([1])));
    }

    #[tokio::test]
    async fn test_memory_upstream_unscripted_method_faults() {
        let upstream = MemoryUpstream::new();
        let outcome = upstream.call(None, "missing", None).await.unwrap();
        assert!(matches!(outcome, UpstreamOutcome::Fault(f) if f.code == -32601));
    }

    #[tokio::test]
    async fn test_tcp_upstream_roundtrip() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();

            let request: RpcRequest = serde_json::from_str(line.trim()).unwrap();
            let response = RpcResponse::success(request.id, serde_json::json!({"echo": true}));
            let reply = serde_json::to_string(&response).unwrap();
            write_half
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        });

        let upstream = TcpUpstream::new(addr);
        let outcome = upstream.call(None, "status", None).await.unwrap();
        assert_eq!(
            outcome,
            UpstreamOutcome::Returned(serde_json::json!({"echo": true}))
        );
    }

    #[tokio::test]
    async fn test_tcp_upstream_connect_failure_is_transport_error() {
        // Port 1 is essentially never listening.
        let upstream = TcpUpstream::new("127.0.0.1:1".parse().unwrap());
        let err = upstream.call(None, "ping", None).await.unwrap_err();
        assert!(matches!(err, RpcTapError::Transport(_)));
    }
}
