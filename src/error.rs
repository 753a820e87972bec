use thiserror::Error;

use crate::env::EnvironmentError;

/// Result type for aurum operations
pub type Result<T> = std::result::Result<T, AurumError>;

/// Main error type for the aurum library
#[derive(Debug, Error)]
pub enum AurumError {
    /// Incompatible tensor shapes
    #[error("shape mismatch: expected {expected}, got {actual}")]
    Shape {
        expected: String,
        actual: String,
    },

    /// A layer was used before `compile`
    #[error("layer '{layer}' used before compile")]
    NotCompiled { layer: String },

    /// The experience store holds fewer events than requested
    #[error("insufficient data: requested {requested} events, store holds {available}")]
    InsufficientData { requested: usize, available: usize },

    /// Learn was called with no rows
    #[error("cannot learn from an empty batch")]
    EmptyBatch,

    /// Propagated from the environment collaborator
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Invalid parameter value
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Numerical computation errors
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Bad configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors (config files)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ndarray::ShapeError> for AurumError {
    fn from(err: ndarray::ShapeError) -> Self {
        AurumError::Shape {
            expected: "compatible layout".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl AurumError {
    pub fn shape<S: Into<String>>(expected: S, actual: S) -> Self {
        AurumError::Shape {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        AurumError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn not_compiled<S: Into<String>>(layer: S) -> Self {
        AurumError::NotCompiled { layer: layer.into() }
    }

    /// Errors that a learn step treats as "nothing to do" rather than a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AurumError::InsufficientData { .. } | AurumError::EmptyBatch
        )
    }
}
