//! Error types for fulcrum

use thiserror::Error;

/// Main error type for fulcrum
#[derive(Error, Debug)]
pub enum FulcrumError {
    /// A server with this id is already registered
    #[error("Server already registered: {0}")]
    DuplicateServer(String),

    /// No server with this id is registered
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// The health loop was started twice
    #[error("Health loop is already running")]
    HealthLoopRunning,

    /// A health probe failed for a server
    #[error("Health probe error: {0}")]
    Probe(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for fulcrum operations
pub type FulcrumResult<T> = Result<T, FulcrumError>;

impl From<serde_json::Error> for FulcrumError {
    fn from(err: serde_json::Error) -> Self {
        FulcrumError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FulcrumError {
    fn from(err: toml::de::Error) -> Self {
        FulcrumError::Config(err.to_string())
    }
}
