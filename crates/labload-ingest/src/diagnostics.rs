//! Diagnostics and error files
//!
//! The diagnostics file is the audit trail of a run: key counters, backing
//! lookups, keys allocated per record, finalize requests and bulk loads. The
//! error file lists rejected records, one `Line <n>: <message>` per problem,
//! and nothing else, so an empty error file means every line was accepted.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;

use crate::error::{LoadError, Result};

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Writer of one run's diagnostics and error files
pub struct RunLog {
    diagnostics: BufWriter<File>,
    errors: BufWriter<File>,
}

impl RunLog {
    /// Create both files, truncating earlier runs' output.
    pub fn create(diagnostics_path: &Path, error_path: &Path) -> Result<Self> {
        let open = |path: &Path| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|source| LoadError::OutputOpen {
                    path: path.to_path_buf(),
                    source,
                })
        };

        let mut log = Self {
            diagnostics: open(diagnostics_path)?,
            errors: open(error_path)?,
        };
        log.note(format_args!("Start Date/Time: {}", Local::now().format(TIMESTAMP_FORMAT)))?;
        Ok(log)
    }

    /// Append one line to the diagnostics file.
    pub fn note(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.diagnostics, "{}", message)?;
        Ok(())
    }

    /// Report a problem of the record on input line `line`.
    pub fn record_error(&mut self, line: u64, message: impl Display) -> Result<()> {
        writeln!(self.errors, "Line {}: {}", line, message)?;
        Ok(())
    }

    /// Report the error that aborted the run, in both files.
    pub fn fatal(&mut self, err: &LoadError) -> Result<()> {
        writeln!(self.errors, "{}", err)?;
        self.note(format_args!("FATAL: {}", err))
    }

    /// Stamp the end time and flush both files.
    pub fn finish(mut self) -> Result<()> {
        self.note(format_args!("End Date/Time: {}", Local::now().format(TIMESTAMP_FORMAT)))?;
        self.diagnostics.flush()?;
        self.errors.flush()?;
        Ok(())
    }
}
