//! Labload Ingest Library
//!
//! Validation, key assignment and multi-stream emission for probe data
//! loads. One generic pipeline serves every load type; the differences
//! between load types live in declarative [`schema::LoadSchema`]s.
//!
//! # Pipeline
//!
//! - [`resolver`]: external identifiers to surrogate keys, cached per run
//! - [`keys`]: per-entity key counters seeded from the backing store
//! - [`validator`]: per-record resolution with full error collection
//! - [`emitter`]: coordinated rows across the output streams
//! - [`driver`]: the run state machine, finalize step and bulk loads
//!
//! # Example
//!
//! ```no_run
//! use labload_common::RunMode;
//! use labload_ingest::catalog::{IdentifierCatalog, KeyCatalog};
//! use labload_ingest::config::LoadConfig;
//! use labload_ingest::driver::RunDriver;
//! use labload_ingest::loader::NoopLoader;
//! use labload_ingest::schema::LoadType;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LoadConfig::new(LoadType::Probe, RunMode::Preview, "probes.txt", "out", "ref");
//!     config.validate()?;
//!
//!     let references = IdentifierCatalog::open(&config.reference_dir)?;
//!     let keys = KeyCatalog::open(&config.reference_dir)?;
//!     let mut driver = RunDriver::new(config, references, keys, NoopLoader::new());
//!
//!     let summary = driver.run_file()?;
//!     println!("{} accepted, {} rejected", summary.accepted, summary.rejected);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod keys;
pub mod loader;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod streams;
pub mod validator;

pub use cli::Cli;
pub use error::{LoadError, Result};
