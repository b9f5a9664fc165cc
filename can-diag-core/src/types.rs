//! Core result and error types for the diagnostics console
//!
//! Every fallible operation in the library returns [`Result`]. Codec and
//! aggregator errors are surfaced to the immediate caller; session errors
//! terminate the current run and leave the session restartable.

/// Result type for diagnostics operations
pub type Result<T> = std::result::Result<T, DiagError>;

/// Errors that can occur in the diagnostics core
#[derive(Debug, thiserror::Error)]
pub enum DiagError {
    #[error("Frame too short: signal needs {needed} bytes but frame has {actual}")]
    DecodeOutOfRange { needed: usize, actual: usize },

    #[error("Value not encodable: {0}")]
    EncodeValueOutOfRange(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignal(String),

    #[error("Correlation needs at least 3 samples, got {got}")]
    InsufficientSamples { got: usize },

    #[error("A correlation session is already running")]
    AlreadyRunning,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Correlation engine error: {0}")]
    Engine(String),

    #[error("Sample import produced no valid rows: {0}")]
    ImportParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DiagError::DecodeOutOfRange {
            needed: 4,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Frame too short: signal needs 4 bytes but frame has 2"
        );

        let err = DiagError::InsufficientSamples { got: 2 };
        assert!(err.to_string().contains("at least 3"));
    }
}
