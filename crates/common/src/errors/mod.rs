//! Error types for LinkForge
//!
//! Provides a single error enum shared by the engine and its adapters:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes
//! - Transient/permanent classification for batch retries

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,
    SelfLoop,

    // Resource errors (4xxx)
    ContentNotFound,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    TransactionError,

    // Cache errors (8xxx)
    CacheError,

    // Engine errors (85xx)
    PlacementError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::SelfLoop => 1005,

            ErrorCode::ContentNotFound => 4002,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::TransactionError => 7003,

            ErrorCode::CacheError => 8006,

            ErrorCode::PlacementError => 8501,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Self-referencing link rejected for content {id}")]
    SelfLoop { id: Uuid },

    // Resource errors
    #[error("Content item not found: {id}")]
    ContentNotFound { id: Uuid },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    /// Edge batch for one source item failed and was rolled back
    #[error("Link transaction for {source_id} rolled back: {source}")]
    Transaction {
        source_id: Uuid,
        source: Box<AppError>,
    },

    // Cache errors
    #[error("Cache error: {message}")]
    CacheError { message: String },

    // Engine errors
    #[error("Placement error: {message}")]
    Placement { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::SelfLoop { .. } => ErrorCode::SelfLoop,
            AppError::ContentNotFound { .. } => ErrorCode::ContentNotFound,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Transaction { .. } => ErrorCode::TransactionError,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::Placement { .. } => ErrorCode::PlacementError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a batch job may retry the operation that produced this error
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::DatabaseConnection { .. } | AppError::CacheError { .. } => true,
            AppError::Database(err) => matches!(
                err,
                sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_)
            ),
            AppError::Transaction { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Wrap an error raised inside an edge transaction
    pub fn transaction(source_id: Uuid, source: AppError) -> Self {
        AppError::Transaction {
            source_id,
            source: Box::new(source),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
