//! Error types shared by the permweave crates
//!
//! Only caller mistakes are reported here. Runtime conditions such as
//! malformed regex nodes or missing parent groups are absorbed by the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A context key or value was empty after trimming
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// A node could not be built from the supplied parts
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Create an invalid context error
    pub fn invalid_context<S: Into<String>>(msg: S) -> Self {
        CoreError::InvalidContext(msg.into())
    }

    /// Create an invalid node error
    pub fn invalid_node<S: Into<String>>(msg: S) -> Self {
        CoreError::InvalidNode(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        CoreError::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_context("empty key");
        assert!(matches!(err, CoreError::InvalidContext(_)));

        let err = CoreError::invalid_node("blank key");
        assert!(matches!(err, CoreError::InvalidNode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_context("empty key");
        assert_eq!(err.to_string(), "Invalid context: empty key");

        let err = CoreError::invalid("weight out of range");
        assert_eq!(err.to_string(), "Invalid: weight out of range");
    }

    #[test]
    fn test_from_json_error() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CoreError = parse.into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
