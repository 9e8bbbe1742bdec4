//! Error types for smm-fit

use thiserror::Error;

/// Errors that can occur while loading events or exporting parameters.
///
/// The estimation core (`extract`, `estimate`) is total and never returns
/// one of these; they are raised at the loading and export boundaries.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse event log: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Insufficient events for computation: {0}")]
    InsufficientEvents(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameter table: {0}")]
    InvalidTable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = ComputeError::MissingField("timestamp".to_string());
        assert_eq!(e.to_string(), "Missing required field: timestamp");

        let e = ComputeError::InsufficientEvents("got 1, need at least 2".to_string());
        assert_eq!(
            e.to_string(),
            "Insufficient events for computation: got 1, need at least 2"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: ComputeError = err.into();
        assert!(matches!(e, ComputeError::JsonError(_)));
        assert!(e.to_string().starts_with("Invalid JSON:"));
    }
}
