//! Error types for Storemind

use thiserror::Error;

/// Result type alias using Storemind's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Storemind
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// No trained forecast model exists for the requested product
    #[error("No trained model for product '{0}'. Train it first.")]
    NotTrained(String),

    /// Too few historical points to fit a forecast model
    #[error("Insufficient data for product '{product_id}': {points} distinct dates, need {required}")]
    InsufficientData {
        product_id: String,
        points: usize,
        required: usize,
    },

    /// Malformed input, rejected before any write
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A persisted artifact failed to deserialize
    #[error("Corrupt stored artifact: {0}")]
    StorageCorruption(String),

    /// Embedding backend or durable store unreachable
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::NotTrained(_)
                | Error::InsufficientData { .. }
                | Error::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(Error::NotFound("doc 1".into()).is_client_error());
        assert!(Error::NotTrained("p1".into()).is_client_error());
        assert!(Error::InsufficientData {
            product_id: "p1".into(),
            points: 10,
            required: 14,
        }
        .is_client_error());
        assert!(Error::Validation("bad".into()).is_client_error());

        assert!(!Error::StorageCorruption("models/p1.json".into()).is_client_error());
        assert!(!Error::Upstream("embedding backend".into()).is_client_error());
        assert!(!Error::Internal("oops".into()).is_client_error());
    }

    #[test]
    fn test_insufficient_data_message_names_the_shortfall() {
        let err = Error::InsufficientData {
            product_id: "p1".into(),
            points: 10,
            required: 14,
        };
        let msg = err.to_string();
        assert!(msg.contains("p1"));
        assert!(msg.contains("10"));
        assert!(msg.contains("14"));
    }
}
