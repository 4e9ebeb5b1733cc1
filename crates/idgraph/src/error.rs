//! Error types for store and export operations.
//!
//! Traversal and analysis never fail at runtime: their preconditions are
//! checked with debug assertions. Everything that touches the store by handle
//! returns [`Result<T>`].

use crate::graph::{ObjectId, ObjectType};
use thiserror::Error;

/// Result type alias for idgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error type for all fallible store operations.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Object handle does not resolve to a live object
    #[error("Object not found: {object_id}")]
    ObjectNotFound {
        /// Handle of the missing object
        object_id: ObjectId,
    },

    /// Payload variant does not match the declared object type
    #[error("Data type mismatch: expected {expected} data, got {actual} data")]
    DataTypeMismatch {
        /// Declared object type
        expected: ObjectType,
        /// Type of the supplied payload
        actual: ObjectType,
    },

    /// Invalid operation (e.g., embedding a type that cannot be embedded)
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of what went wrong
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl GraphError {
    /// Create an invalid-operation error from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a serialization error from a message and optional source.
    pub fn serialization<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }
}
