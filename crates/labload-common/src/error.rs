//! Error types shared by the labload crates

use thiserror::Error;

/// Result type alias for shared labload operations
pub type Result<T> = std::result::Result<T, LabError>;

/// Main error type for shared labload operations
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid Processing Mode: {0}. Expected 'preview' or 'load'.")]
    InvalidMode(String),
}

impl LabError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
