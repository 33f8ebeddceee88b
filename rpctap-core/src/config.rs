//! Configuration types for the interception proxy

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcTapError};

/// Main configuration for the proxy process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Public name of the target to proxy (resolved via the naming
    /// service) and republished for the proxy itself.
    pub target_name: String,

    /// Address the proxy serves intercepted calls on.
    pub listen_addr: SocketAddr,

    /// Address of the admin command channel.
    pub admin_addr: SocketAddr,

    /// Recorder configuration.
    pub recorder: RecorderConfig,

    /// Static naming table entries (name -> endpoint address).
    #[serde(default)]
    pub naming: Vec<NameEntry>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_name: "//localhost/server".to_string(),
            listen_addr: "127.0.0.1:7099".parse().expect("valid default addr"),
            admin_addr: "127.0.0.1:7100".parse().expect("valid default addr"),
            recorder: RecorderConfig::default(),
            naming: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration: TOML file layered under `RPCTAP_`
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RPCTAP_").split("__"))
            .extract()
            .map_err(|e| RpcTapError::Configuration(e.to_string()))
    }
}

/// One entry in the static naming table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    pub addr: SocketAddr,
}

/// Which recorder variant observes completed calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecorderConfig {
    /// Observe and discard.
    #[default]
    Null,

    /// Append one JSON line per call.
    Log {
        /// Log file path
        path: PathBuf,
    },

    /// Append a reconstruction-script fragment per call.
    Script {
        /// Script file path
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr.port(), 7099);
        assert!(matches!(config.recorder, RecorderConfig::Null));
        assert!(config.naming.is_empty());
    }

    #[test]
    fn test_load_toml() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("rpctap.toml");
        std::fs::write(
            &path,
            r#"
target_name = "//demo/server"
listen_addr = "127.0.0.1:8099"
admin_addr = "127.0.0.1:8100"

[recorder]
type = "script"
path = "calls.bsh"

[[naming]]
name = "//demo/server"
addr = "127.0.0.1:9000"
"#,
        )
        .unwrap();

        let config = ProxyConfig::load(&path).unwrap();
        assert_eq!(config.target_name, "//demo/server");
        assert_eq!(config.listen_addr.port(), 8099);
        assert!(matches!(config.recorder, RecorderConfig::Script { .. }));
        assert_eq!(config.naming.len(), 1);
        assert_eq!(config.naming[0].addr.port(), 9000);
    }

    #[test]
    fn test_recorder_config_roundtrip() {
        let recorder = RecorderConfig::Log {
            path: PathBuf::from("calls.jsonl"),
        };
        let json = serde_json::to_string(&recorder).unwrap();
        assert!(json.contains("\"type\":\"log\""));
        let back: RecorderConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, RecorderConfig::Log { .. }));
    }
}
