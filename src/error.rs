//! Error types for the index service.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation. Every error maps to a machine-readable
//! code and an HTTP status for the API layer.

use thiserror::Error;

/// Top-level service error.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Grep error: {0}")]
    Grep(#[from] GrepError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown project '{requested}'. Known projects: {}", known.join(", "))]
    UnknownProject {
        requested: String,
        known: Vec<String>,
    },

    #[error("Language '{0}' does not support this operation")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("File not found in store: {path}")]
    FileNotFound { path: String },

    #[error("Body decompression failed for {file_id}: {reason}")]
    Decompress { file_id: crate::types::FileId, reason: String },
}

/// Grep pipeline errors.
#[derive(Error, Debug)]
pub enum GrepError {
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("Pattern rejected: {reason}")]
    DangerousPattern { reason: String },

    #[error("Search engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Search engine timed out after {ms}ms")]
    EngineTimeout { ms: u64 },

    #[error("Grep budget of {ms}ms exceeded")]
    BudgetExceeded { ms: u64 },
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl ServiceError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.code(),
            Self::Grep(e) => e.code(),
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::UnknownProject { .. } => "UNKNOWN_PROJECT",
            Self::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Returns the HTTP status code this error surfaces as.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidParameter(_)
            | Self::UnknownProject { .. }
            | Self::UnsupportedLanguage(_) => 400,
            Self::Grep(GrepError::InvalidPattern(_) | GrepError::DangerousPattern { .. }) => 400,
            Self::Grep(GrepError::EngineUnavailable(_)) => 503,
            Self::Grep(GrepError::EngineTimeout { .. } | GrepError::BudgetExceeded { .. }) => 504,
            _ => 500,
        }
    }

    /// Contextual guidance attached to error responses.
    #[must_use]
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::UnknownProject { known, .. } => {
                vec![format!("Available projects: {}", known.join(", "))]
            }
            Self::Grep(GrepError::EngineUnavailable(_)) => {
                vec!["The full-text engine is starting or down; retry shortly".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

impl StoreError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::Decompress { .. } => "DECOMPRESS_ERROR",
        }
    }
}

impl GrepError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPattern(_) => "INVALID_PATTERN",
            Self::DangerousPattern { .. } => "DANGEROUS_PATTERN",
            Self::EngineUnavailable(_) => "NOT_AVAILABLE",
            Self::EngineTimeout { .. } => "TIMEOUT",
            Self::BudgetExceeded { .. } => "TIMEOUT",
        }
    }
}
