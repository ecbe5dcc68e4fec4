//! Error types for UniStream

/// Result type alias using UniStream's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for UniStream operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credential shape errors (e.g. a compound key missing its separator)
    #[error("credential error: {0}")]
    Credential(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream transport errors
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}
