//! Invocation records
//!
//! One record per intercepted call: method identity, arguments, and
//! the outcome. Created at call entry, finalized exactly once at call
//! completion, then immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::proxy::Handle;
use crate::wire::{type_descriptor, RpcFault};

/// Outcome of a completed call: either the returned value or the
/// captured failure. Exactly one by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Returned { value: Value },
    Fault { kind: i64, message: String },
}

impl Outcome {
    pub fn from_fault(fault: &RpcFault) -> Self {
        Outcome::Fault {
            kind: fault.code,
            message: fault.message.clone(),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault { .. })
    }
}

/// Immutable capture of one intercepted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Handle the call was made against; `None` means the root object.
    pub target: Option<Handle>,

    /// Method name as it appeared on the wire.
    pub method: String,

    /// Ordered JSON type descriptors, one per argument.
    pub argument_types: Vec<String>,

    /// Ordered argument values.
    pub arguments: Vec<Value>,

    /// Returned value or failure descriptor.
    pub outcome: Outcome,

    /// When the call entered the proxy.
    pub timestamp: DateTime<Utc>,

    /// Wall-clock duration of the forwarded call.
    pub duration_ms: u64,
}

impl Invocation {
    /// Begin capturing a call. Finalize with [`InvocationBuilder::returned`]
    /// or [`InvocationBuilder::faulted`].
    pub fn begin(target: Option<Handle>, method: impl Into<String>) -> InvocationBuilder {
        InvocationBuilder {
            target,
            method: method.into(),
            argument_types: Vec::new(),
            arguments: Vec::new(),
            timestamp: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Short human-readable summary for log lines.
    pub fn summary(&self) -> String {
        let target = match &self.target {
            Some(h) => format!("{h}"),
            None => "<root>".to_string(),
        };
        let outcome = match &self.outcome {
            Outcome::Returned { .. } => "ok".to_string(),
            Outcome::Fault { kind, message } => format!("fault {kind}: {message}"),
        };
        format!(
            "{target}.{}/{} -> {outcome}",
            self.method,
            self.arguments.len()
        )
    }
}

/// Builder created at call entry; consumed exactly once when the
/// outcome is known.
#[derive(Debug)]
pub struct InvocationBuilder {
    target: Option<Handle>,
    method: String,
    argument_types: Vec<String>,
    arguments: Vec<Value>,
    timestamp: DateTime<Utc>,
    started: Instant,
}

impl InvocationBuilder {
    /// Record the ordered argument values, deriving type descriptors.
    pub fn arguments(mut self, args: &[Value]) -> Self {
        self.argument_types = args.iter().map(|v| type_descriptor(v).to_string()).collect();
        self.arguments = args.to_vec();
        self
    }

    pub fn returned(self, value: Value) -> Invocation {
        self.finish(Outcome::Returned { value })
    }

    pub fn faulted(self, fault: &RpcFault) -> Invocation {
        self.finish(Outcome::from_fault(fault))
    }

    fn finish(self, outcome: Outcome) -> Invocation {
        Invocation {
            target: self.target,
            method: self.method,
            argument_types: self.argument_types,
            arguments: self.arguments,
            outcome,
            timestamp: self.timestamp,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
