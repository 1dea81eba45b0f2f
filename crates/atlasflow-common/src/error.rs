//! Error types for AtlasFlow

use thiserror::Error;

/// Result type alias for AtlasFlow operations
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Main error type for AtlasFlow
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
