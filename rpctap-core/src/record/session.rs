//! Session log persistence
//!
//! An ordered, append-only log of invocation records for one proxy
//! session, persisted as JSON lines: one header line followed by one
//! line per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use uuid::Uuid;

use super::invocation::Invocation;

/// Current schema version for session logs
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Envelope wrapping each invocation with its position in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    /// Sequence number within the session
    pub sequence: u64,

    /// The invocation record
    pub invocation: Invocation,
}

/// A complete session log: every call intercepted during one proxy
/// lifetime, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Unique session identifier
    pub session_id: String,

    /// Name of the proxied target
    pub target_name: Option<String>,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session ended (if finished)
    pub ended_at: Option<DateTime<Utc>>,

    /// All invocations in order
    pub invocations: Vec<InvocationEnvelope>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            session_id: Uuid::new_v4().to_string(),
            target_name: None,
            started_at: Utc::now(),
            ended_at: None,
            invocations: Vec::new(),
        }
    }

    pub fn with_target(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    /// Append an invocation, assigning its sequence number.
    pub fn push(&mut self, invocation: Invocation) {
        self.invocations.push(InvocationEnvelope {
            sequence: self.invocations.len() as u64,
            invocation,
        });
    }

    /// Mark the session as ended.
    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// All invocations that faulted.
    pub fn faults(&self) -> impl Iterator<Item = &InvocationEnvelope> {
        self.invocations
            .iter()
            .filter(|e| e.invocation.outcome.is_fault())
    }

    /// Save the log to a JSON-lines file.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);

        let header = serde_json::json!({
            "type": "header",
            "schema_version": self.schema_version,
            "session_id": self.session_id,
            "target_name": self.target_name,
            "started_at": self.started_at,
            "ended_at": self.ended_at,
        });
        writeln!(writer, "{}", serde_json::to_string(&header)?)?;

        for envelope in &self.invocations {
            writeln!(writer, "{}", serde_json::to_string(envelope)?)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a log from a JSON-lines file.
    ///
    /// Accepts both shapes the recorders produce: a `save`d file with
    /// a header line, and raw recorder output where every line is an
    /// invocation. The first line is only treated as a header when it
    /// says it is one; otherwise it counts as call 0.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let first_line = lines
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "Empty file"))??;
        let first: Value = serde_json::from_str(&first_line)?;

        let mut log = if first["type"] == "header" {
            SessionLog {
                schema_version: first["schema_version"].as_u64().unwrap_or(1) as u32,
                session_id: first["session_id"]
                    .as_str()
                    .unwrap_or("unknown")
                    .to_string(),
                target_name: first["target_name"].as_str().map(|s| s.to_string()),
                started_at: first["started_at"]
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now),
                ended_at: first["ended_at"]
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                invocations: Vec::new(),
            }
        } else {
            let envelope: InvocationEnvelope = serde_json::from_str(&first_line)?;
            let mut log = SessionLog::new();
            log.invocations.push(envelope);
            log
        };

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: InvocationEnvelope = serde_json::from_str(&line)?;
            log.invocations.push(envelope);
        }

        Ok(log)
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}
