//! Error types for rpctap operations

/// Result type for rpctap operations
pub type Result<T> = std::result::Result<T, RpcTapError>;

/// Error types for the interception proxy
#[derive(Debug, thiserror::Error)]
pub enum RpcTapError {
    /// Proxy setup failed (registry, listener, or name publication)
    #[error("Setup error: {0}")]
    Setup(String),

    /// Naming service could not resolve a name
    #[error("Name not found: {0}")]
    NameNotFound(String),

    /// A request addressed a handle the registry does not know
    #[error("Unknown object handle: {0}")]
    UnknownHandle(String),

    /// Transport-level failure talking to the real endpoint or a caller
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for RpcTapError {
    fn from(s: String) -> Self {
        RpcTapError::Other(s)
    }
}

impl From<&str> for RpcTapError {
    fn from(s: &str) -> Self {
        RpcTapError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RpcTapError {
    fn from(err: anyhow::Error) -> Self {
        RpcTapError::Other(err.to_string())
    }
}
