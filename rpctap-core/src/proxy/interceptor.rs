//! The dynamic forwarding layer
//!
//! One generic interceptor stands in for every wrapped remote object:
//! it resolves the addressed target, forwards the call unchanged,
//! chain-wraps any remote references in the result so nested objects
//! stay interceptable, reports the completed call to the recorder,
//! and re-raises remote faults untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, RpcTapError};
use crate::proxy::registry::{Handle, ReferenceRegistry, RemoteRef};
use crate::proxy::upstream::{Upstream, UpstreamOutcome};
use crate::record::{Invocation, MethodRecorder};
use crate::wire::{as_remote_ref, remote_ref, RpcFault, RpcRequest, RpcResponse};

pub struct Interceptor {
    upstream: Arc<dyn Upstream>,
    registry: Arc<ReferenceRegistry>,
    recorder: Arc<dyn MethodRecorder>,
}

impl Interceptor {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        registry: Arc<ReferenceRegistry>,
        recorder: Arc<dyn MethodRecorder>,
    ) -> Self {
        Self {
            upstream,
            registry,
            recorder,
        }
    }

    /// Handle one incoming call end to end.
    ///
    /// Remote faults come back as faults with the endpoint's own code
    /// and message, byte-unchanged. Infrastructure failures (unknown
    /// handle, unreachable endpoint, wrapper setup) come back as a
    /// distinct proxy fault and are never recorded as call outcomes.
    pub async fn intercept(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        match self.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Infrastructure error handling call: {e}");
                RpcResponse::fault(id, RpcFault::proxy_error(e.to_string()))
            }
        }
    }

    async fn forward(&self, request: RpcRequest) -> Result<RpcResponse> {
        let target = request.object.clone().map(Handle::new);

        // Resolve the real target: the root, or a previously wrapped
        // nested object. Unknown handles fail before anything is
        // forwarded.
        let handle = target.clone().unwrap_or_else(Handle::root);
        let resolved = self.registry.resolve(&handle).await?;
        let upstream_object = if resolved.is_root() {
            None
        } else {
            Some(resolved.upstream_handle.as_str())
        };

        let arguments = match &request.params {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };
        let builder = Invocation::begin(target, request.method.clone()).arguments(&arguments);

        let outcome = self
            .upstream
            .call(upstream_object, &request.method, request.params.clone())
            .await?;

        match outcome {
            UpstreamOutcome::Returned(value) => {
                // Wrapper setup failures are fatal for this call and
                // must not be mistaken for remote faults.
                let wrapped = self.wrap_remote_refs(value, &request.method).await?;

                let invocation = builder.returned(wrapped.clone());
                self.recorder.record(invocation).await;

                Ok(RpcResponse::success(request.id, wrapped))
            }
            UpstreamOutcome::Fault(fault) => {
                let invocation = builder.faulted(&fault);
                self.recorder.record(invocation).await;

                // Re-raise to the caller unchanged.
                Ok(RpcResponse::fault(request.id, fault))
            }
        }
    }

    /// Replace every upstream remote reference in `value` with a
    /// proxy-side handle, registering each exactly once. Wrapping the
    /// same underlying reference twice reuses the existing handle.
    async fn wrap_remote_refs(&self, mut value: Value, method: &str) -> Result<Value> {
        let mut upstream_handles = Vec::new();
        collect_refs(&value, &mut upstream_handles);
        if upstream_handles.is_empty() {
            return Ok(value);
        }

        let mut mapping: HashMap<String, String> = HashMap::new();
        for upstream_handle in upstream_handles {
            if mapping.contains_key(&upstream_handle) {
                continue;
            }
            let handle = self
                .registry
                .register_or_existing(RemoteRef::new(&upstream_handle, method))
                .await;
            mapping.insert(upstream_handle, handle.as_str().to_string());
        }

        rewrite_refs(&mut value, &mapping)?;
        Ok(value)
    }
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    if let Some(handle) = as_remote_ref(value) {
        out.push(handle.to_string());
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

fn rewrite_refs(value: &mut Value, mapping: &HashMap<String, String>) -> Result<()> {
    if let Some(handle) = as_remote_ref(value) {
        let replacement = mapping
            .get(handle)
            .ok_or_else(|| RpcTapError::Setup(format!("unmapped remote reference: {handle}")))?;
        *value = remote_ref(replacement);
        return Ok(());
    }
    match value {
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, mapping)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                rewrite_refs(item, mapping)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::upstream::MemoryUpstream;
    use crate::record::{NullRecorder, Outcome};
    use crate::wire::RequestId;
    use tokio::sync::Mutex;

    use async_trait::async_trait;

    /// Recorder that keeps everything in memory for assertions.
    #[derive(Default)]
    struct CapturingRecorder {
        invocations: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl MethodRecorder for CapturingRecorder {
        async fn record(&self, invocation: Invocation) {
            self.invocations.lock().await.push(invocation);
        }
    }

    async fn rooted(upstream: MemoryUpstream) -> (Interceptor, Arc<CapturingRecorder>) {
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let recorder = Arc::new(CapturingRecorder::default());
        let interceptor = Interceptor::new(
            Arc::new(upstream),
            registry,
            Arc::clone(&recorder) as Arc<dyn MethodRecorder>,
        );
        (interceptor, recorder)
    }

    #[tokio::test]
    async fn test_forwards_and_records_success() {
        let upstream = MemoryUpstream::new().returns("status", serde_json::json!("up"));
        let (interceptor, recorder) = rooted(upstream).await;

        let response = interceptor
            .intercept(RpcRequest::new(1i64, "status"))
            .await;

        assert_eq!(response.result, Some(serde_json::json!("up")));
        let invocations = recorder.invocations.lock().await;
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].method, "status");
        assert!(!invocations[0].outcome.is_fault());
    }

    #[tokio::test]
    async fn test_fault_recorded_and_reraised_unchanged() {
        // Scenario C: a domain fault passes through untouched and is
        // recorded with method name and argument values.
        let fault = RpcFault {
            code: 401,
            message: "authentication failed".to_string(),
            data: Some(serde_json::json!({"kind": "AuthenticationError"})),
        };
        let upstream = MemoryUpstream::new().faults("login", fault.clone());
        let (interceptor, recorder) = rooted(upstream).await;

        let request = RpcRequest::new(7i64, "login")
            .with_params(serde_json::json!(["user", "pass"]));
        let response = interceptor.intercept(request).await;

        assert_eq!(response.error, Some(fault));
        assert!(response.result.is_none());

        let invocations = recorder.invocations.lock().await;
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].method, "login");
        assert_eq!(
            invocations[0].arguments,
            vec![serde_json::json!("user"), serde_json::json!("pass")]
        );
        match &invocations[0].outcome {
            Outcome::Fault { kind, message } => {
                assert_eq!(*kind, 401);
                assert_eq!(message, "authentication failed");
            }
            _ => panic!("expected fault outcome"),
        }
    }

    #[tokio::test]
    async fn test_returned_reference_is_wrapped_and_registered() {
        // Scenario D: exactly one registry entry and one wrapper per
        // returned remote reference, before the call returns.
        let upstream =
            MemoryUpstream::new().returns("openSession", crate::wire::remote_ref("up-session-1"));
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let interceptor = Interceptor::new(
            Arc::new(upstream),
            Arc::clone(&registry),
            Arc::new(NullRecorder::new()),
        );

        assert_eq!(registry.len().await, 1);
        let response = interceptor
            .intercept(RpcRequest::new(1i64, "openSession"))
            .await;
        assert_eq!(registry.len().await, 2);

        // The caller sees the wrapper handle, not the raw upstream one.
        let result = response.result.unwrap();
        let wrapper_handle = as_remote_ref(&result).unwrap().to_string();
        assert_ne!(wrapper_handle, "up-session-1");

        let resolved = registry.resolve(&Handle::new(&wrapper_handle)).await.unwrap();
        assert_eq!(resolved.upstream_handle, "up-session-1");
    }

    #[tokio::test]
    async fn test_wrapping_same_reference_twice_is_idempotent() {
        let upstream =
            MemoryUpstream::new().returns("openSession", crate::wire::remote_ref("up-session-1"));
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let interceptor = Interceptor::new(
            Arc::new(upstream),
            Arc::clone(&registry),
            Arc::new(NullRecorder::new()),
        );

        let first = interceptor
            .intercept(RpcRequest::new(1i64, "openSession"))
            .await;
        let second = interceptor
            .intercept(RpcRequest::new(2i64, "openSession"))
            .await;

        let a = first.result.unwrap();
        let b = second.result.unwrap();
        assert_eq!(as_remote_ref(&a), as_remote_ref(&b));
        // Root plus a single wrapper entry.
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_parallel_calls_wrap_same_reference_once() {
        let upstream =
            MemoryUpstream::new().returns("openSession", crate::wire::remote_ref("up-session-1"));
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let interceptor = Arc::new(Interceptor::new(
            Arc::new(upstream),
            Arc::clone(&registry),
            Arc::new(NullRecorder::new()),
        ));

        let mut tasks = Vec::new();
        for i in 0..16i64 {
            let interceptor = Arc::clone(&interceptor);
            tasks.push(tokio::spawn(async move {
                let response = interceptor
                    .intercept(RpcRequest::new(i, "openSession"))
                    .await;
                as_remote_ref(response.result.as_ref().unwrap())
                    .unwrap()
                    .to_string()
            }));
        }

        let mut wrappers = Vec::new();
        for task in tasks {
            wrappers.push(task.await.unwrap());
        }
        assert!(wrappers.windows(2).all(|pair| pair[0] == pair[1]));
        // Root plus exactly one wrapper entry.
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_call_through_nested_handle() {
        let upstream = MemoryUpstream::new()
            .returns("openSession", crate::wire::remote_ref("up-session-1"))
            .object_returns("up-session-1", "fetch", serde_json::json!(42));
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let recorder = Arc::new(CapturingRecorder::default());
        let interceptor = Interceptor::new(
            Arc::new(upstream),
            Arc::clone(&registry),
            Arc::clone(&recorder) as Arc<dyn MethodRecorder>,
        );

        let open = interceptor
            .intercept(RpcRequest::new(1i64, "openSession"))
            .await;
        let wrapper = as_remote_ref(open.result.as_ref().unwrap())
            .unwrap()
            .to_string();

        // Call through the wrapper; the proxy must rewrite routing to
        // the upstream-side handle.
        let request = RpcRequest::new(2i64, "fetch").with_object(&Handle::new(&wrapper));
        let response = interceptor.intercept(request).await;
        assert_eq!(response.result, Some(serde_json::json!(42)));

        let invocations = recorder.invocations.lock().await;
        assert_eq!(invocations[1].target, Some(Handle::new(&wrapper)));
    }

    #[tokio::test]
    async fn test_unknown_handle_is_infrastructure_fault() {
        let upstream = MemoryUpstream::new();
        let (interceptor, recorder) = rooted(upstream).await;

        let request = RpcRequest::new(3i64, "fetch").with_object(&Handle::new("no-such-handle"));
        let response = interceptor.intercept(request).await;

        let fault = response.error.unwrap();
        assert_eq!(fault.code, -32050);
        assert!(fault.message.contains("no-such-handle"));
        // Never forwarded, never recorded.
        assert!(recorder.invocations.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_nested_references_inside_structures_are_wrapped() {
        let upstream = MemoryUpstream::new().returns(
            "listSessions",
            serde_json::json!([
                crate::wire::remote_ref("up-1"),
                {"name": "second", "ref": crate::wire::remote_ref("up-2")},
            ]),
        );
        let registry = ReferenceRegistry::new();
        registry.register_root(RemoteRef::root("server")).await;
        let interceptor = Interceptor::new(
            Arc::new(upstream),
            Arc::clone(&registry),
            Arc::new(NullRecorder::new()),
        );

        let response = interceptor
            .intercept(RpcRequest::new(1i64, "listSessions"))
            .await;
        // Root + two wrapped references.
        assert_eq!(registry.len().await, 3);

        let result = response.result.unwrap();
        let first = as_remote_ref(&result[0]).unwrap();
        let second = as_remote_ref(&result[1]["ref"]).unwrap();
        assert_ne!(first, "up-1");
        assert_ne!(second, "up-2");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_single_param_object_recorded_as_one_argument() {
        let upstream = MemoryUpstream::new().returns("configure", Value::Null);
        let (interceptor, recorder) = rooted(upstream).await;

        let request = RpcRequest::new(1i64, "configure")
            .with_params(serde_json::json!({"depth": 3}));
        interceptor.intercept(request).await;

        let invocations = recorder.invocations.lock().await;
        assert_eq!(invocations[0].arguments.len(), 1);
        assert_eq!(invocations[0].argument_types, vec!["object"]);
    }

    #[tokio::test]
    async fn test_request_id_preserved() {
        let upstream = MemoryUpstream::new().returns("ping", Value::Null);
        let (interceptor, _) = rooted(upstream).await;

        let response = interceptor
            .intercept(RpcRequest::new("req-9", "ping"))
            .await;
        assert_eq!(response.id, RequestId::String("req-9".to_string()));
    }
}
