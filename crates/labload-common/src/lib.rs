//! Labload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the labload bulk loaders.
//!
//! # Overview
//!
//! This crate provides functionality used by every load type:
//!
//! - **Error Handling**: Shared error type and result alias
//! - **Accessions**: Splitting accession IDs into prefix and numeric parts
//! - **Types**: Surrogate keys, processing modes and load dates
//! - **Logging**: `tracing` subscriber setup
//!
//! # Example
//!
//! ```
//! use labload_common::accession::split_accnum;
//!
//! let acc = split_accnum("MGI:12345");
//! assert_eq!(acc.prefix(), "MGI:");
//! assert_eq!(acc.numeric_part(), Some(12345));
//! ```

pub mod accession;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{LabError, Result};
pub use types::{Key, RunMode};
