//! Error types for optimisation runs

use thiserror::Error;

/// Errors that can occur while optimising a document
///
/// Every variant resolves at the pipeline boundary to either an explicit
/// error value or the original input being served unchanged (see
/// [`DomOptimiser::process_or_passthrough`](crate::DomOptimiser::process_or_passthrough)).
#[derive(Debug, Error)]
pub enum OptimiseError {
    /// HTML parsing produced no usable tree
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Character encoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),
    /// Wall-clock budget exceeded
    #[error("Optimisation timeout exceeded")]
    Timeout,
    /// The rewritten tree could not be serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl OptimiseError {
    /// Get numeric error code for FFI
    pub fn code(&self) -> u32 {
        match self {
            OptimiseError::ParseError(_) => 1,
            OptimiseError::EncodingError(_) => 2,
            OptimiseError::Timeout => 3,
            OptimiseError::SerializationError(_) => 4,
            OptimiseError::InvalidInput(_) => 5,
            OptimiseError::InternalError(_) => 99,
        }
    }
}
