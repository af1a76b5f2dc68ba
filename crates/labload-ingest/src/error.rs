//! Error types for the load pipeline
//!
//! Every variant here is FATAL: the run stops, diagnostics are flushed and
//! the process exits non-zero. Problems confined to one input record are not
//! errors in this sense; they travel as [`crate::validator::FieldError`]
//! values and only cause that record to be skipped.

use std::path::PathBuf;
use thiserror::Error;

use labload_common::LabError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Fatal conditions of a load run
#[derive(Error, Debug)]
pub enum LoadError {
    /// Input file is missing or unreadable
    #[error("Could not open input file '{0}'. Verify the path exists and is readable.")]
    InputNotFound(PathBuf),

    /// A line has fewer tab-separated fields than the load type requires
    #[error("Invalid Line ({line}): {content}")]
    MalformedLine { line: u64, content: String },

    /// A sub-field does not follow its required syntax
    #[error("Invalid {field} on line {line}: '{value}'")]
    MalformedSubField {
        line: u64,
        field: String,
        value: String,
    },

    /// An output stream, diagnostics or error file could not be created
    #[error("Could not open file '{path}': {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reference data could not be read
    #[error("Reference catalog error: {0}")]
    Catalog(String),

    /// A key counter was used before it was initialized from the backing store
    #[error("Key counter for {0} was never initialized")]
    KeyNotInitialized(String),

    /// A row was routed to a stream the load type never opened
    #[error("Output stream {0} is not open for this load type")]
    StreamNotOpen(&'static str),

    /// A bulk-load invocation failed
    #[error("Bulk load of {table} failed: {message}")]
    Loader { table: String, message: String },

    #[error("Flat file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] LabError),
}

impl LoadError {
    /// Create a reference catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a bulk loader error
    pub fn loader(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Loader {
            table: table.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_line_message() {
        let err = LoadError::MalformedLine {
            line: 4,
            content: "ProbeX\tMGI:001".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid Line (4): ProbeX\tMGI:001");
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: LoadError = LabError::InvalidMode("incremental".to_string()).into();
        assert!(err.to_string().starts_with("Invalid Processing Mode: incremental"));
    }
}
