//! Error types for the upgrade run
//!
//! Per-document and per-widget rejections are not errors: they surface as
//! `Ok(None)` from the stages that veto them and are counted in the report.

/// Main error type for migration operations
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsafe target: {0}")]
    UnsafeTarget(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Malformed document {id}: {reason}")]
    Document { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl MigrateError {
    /// Configuration and safety failures halt the run before any data is touched
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsafeTarget(_) | Self::Schema(_))
    }

    /// Shorthand for a document-level structural failure
    pub fn document(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Document {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for MigrateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MigrateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<mongodb::error::Error> for MigrateError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::extjson::de::Error> for MigrateError {
    fn from(err: bson::extjson::de::Error) -> Self {
        Self::Database(format!("Extended JSON decoding failed: {}", err))
    }
}

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(MigrateError::Config("missing --a3-db".into()).is_fatal());
        assert!(MigrateError::UnsafeTarget("same db".into()).is_fatal());
        assert!(!MigrateError::Database("cursor lost".into()).is_fatal());
        assert!(!MigrateError::document("x", "no type").is_fatal());
    }

    #[test]
    fn test_document_error_message() {
        let err = MigrateError::document("abc", "missing type");
        assert_eq!(err.to_string(), "Malformed document abc: missing type");
    }
}
