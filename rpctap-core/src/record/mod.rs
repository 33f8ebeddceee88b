//! Call recording
//!
//! The proxy reports every completed call to a [`MethodRecorder`].
//! Recording is an observability concern: it must never make an
//! otherwise-successful remote call fail, so `record` is infallible
//! by contract and sink errors are downgraded to warnings.

mod invocation;
mod session;

pub use invocation::{Invocation, InvocationBuilder, Outcome};
pub use session::{InvocationEnvelope, SessionLog, SESSION_SCHEMA_VERSION};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::script::ScriptletGenerator;

/// Capability consumed by the proxy to observe completed calls.
///
/// Implementations are used interchangeably behind this interface;
/// the proxy neither knows nor cares which variant is configured.
#[async_trait]
pub trait MethodRecorder: Send + Sync {
    /// Observe a completed call. Must not fail for any well-formed
    /// invocation; internal errors are reported through logging only.
    async fn record(&self, invocation: Invocation);
}

/// Observes and discards. Default when no recording is configured.
#[derive(Debug, Default)]
pub struct NullRecorder;

impl NullRecorder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MethodRecorder for NullRecorder {
    async fn record(&self, _invocation: Invocation) {}
}

/// Appends one JSON line per invocation to a shared sink, plus a
/// human-readable summary through `tracing`.
pub struct LogRecorder {
    sink: Mutex<tokio::fs::File>,
    sequence: AtomicU64,
}

impl LogRecorder {
    /// Open (append) the log file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            sink: Mutex::new(file),
            sequence: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl MethodRecorder for LogRecorder {
    async fn record(&self, invocation: Invocation) {
        // The mutex serializes writes so concurrent calls never
        // interleave within one log line. Sequence assignment happens
        // under the same lock, keeping file order and sequence order
        // identical.
        let mut sink = self.sink.lock().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::info!(sequence, "{}", invocation.summary());

        let envelope = InvocationEnvelope {
            sequence,
            invocation,
        };
        let line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize invocation record: {e}");
                return;
            }
        };

        if let Err(e) = sink.write_all(format!("{line}\n").as_bytes()).await {
            tracing::warn!("Failed to append invocation record: {e}");
            return;
        }
        if let Err(e) = sink.flush().await {
            tracing::warn!("Failed to flush invocation record: {e}");
        }
    }
}

/// Renders each invocation as a reconstruction-script fragment and
/// appends it to its own sink. Integration point between the recorder
/// and the serializer.
pub struct ScriptRecorder {
    generator: ScriptletGenerator,
    sink: Mutex<tokio::fs::File>,
    sequence: AtomicU64,
}

impl ScriptRecorder {
    pub async fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            generator: ScriptletGenerator::new(),
            sink: Mutex::new(file),
            sequence: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl MethodRecorder for ScriptRecorder {
    async fn record(&self, invocation: Invocation) {
        // Same discipline as LogRecorder: sequence and write under
        // one lock so fragments land in sequence order.
        let mut sink = self.sink.lock().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let fragment = self.generator.render_invocation(&invocation, sequence);

        if let Err(e) = sink.write_all(fragment.as_bytes()).await {
            tracing::warn!("Failed to append script fragment: {e}");
            return;
        }
        if let Err(e) = sink.flush().await {
            tracing::warn!("Failed to flush script fragment: {e}");
        }
    }
}
