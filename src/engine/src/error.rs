//! Error types for the permission engine

use thiserror::Error;
use uuid::Uuid;

use permweave_core::{CoreError, HolderId};

/// Permission engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The holder is not loaded into the engine
    #[error("Holder not loaded: {0}")]
    HolderNotLoaded(HolderId),

    /// The user is not loaded into the engine
    #[error("User not loaded: {0}")]
    UserNotLoaded(Uuid),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A processor failed while evaluating a permission
    #[error("Processor error: {0}")]
    Processor(String),

    /// A buffered request was made outside of a Tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// A scheduled computation was dropped before producing a result
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Error raised by the core value types
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
