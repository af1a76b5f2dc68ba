//! Run configuration
//!
//! Everything a load run needs to know before it starts: what to load, from
//! where, into which directory, and whether the database is touched.

use std::path::PathBuf;

use serde::Serialize;

use labload_common::types::LoadDate;
use labload_common::{LabError, RunMode};

use crate::error::Result;
use crate::schema::LoadType;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default delimiter of bulk-load files
pub const DEFAULT_DELIMITER: char = '|';

/// Extension of the diagnostics file written next to the output streams
pub const DIAGNOSTICS_EXTENSION: &str = "diagnostics";

/// Extension of the error file written next to the output streams
pub const ERROR_EXTENSION: &str = "error";

/// Configuration of one load run
#[derive(Debug, Clone, Serialize)]
pub struct LoadConfig {
    pub load_type: LoadType,
    pub mode: RunMode,

    /// Tab-delimited input file
    pub input_file: PathBuf,

    /// Directory receiving output streams, diagnostics and error file
    pub output_dir: PathBuf,

    /// Directory of reference data snapshots
    pub reference_dir: PathBuf,

    /// Delimiter of bulk-load files
    pub delimiter: char,

    /// Command template run once per stream in load mode
    pub bulk_command: Option<String>,

    /// Date stamped into every emitted row
    pub load_date: LoadDate,

    /// Show a progress spinner while reading
    #[serde(skip)]
    pub show_progress: bool,
}

impl LoadConfig {
    /// Create a config with default delimiter, today's date and no bulk
    /// command.
    pub fn new(
        load_type: LoadType,
        mode: RunMode,
        input_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        reference_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            load_type,
            mode,
            input_file: input_file.into(),
            output_dir: output_dir.into(),
            reference_dir: reference_dir.into(),
            delimiter: DEFAULT_DELIMITER,
            bulk_command: None,
            load_date: LoadDate::today(),
            show_progress: false,
        }
    }

    /// Set the bulk-load file delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the bulk-load command template
    pub fn with_bulk_command(mut self, command: impl Into<String>) -> Self {
        self.bulk_command = Some(command.into());
        self
    }

    /// Set the date stamped into emitted rows
    pub fn with_load_date(mut self, date: LoadDate) -> Self {
        self.load_date = date;
        self
    }

    /// Enable the progress spinner
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Check the settings that must hold before the run log can be
    /// created. A missing input file is reported by the run itself.
    pub fn validate(&self) -> Result<()> {
        if !self.reference_dir.is_dir() {
            return Err(LabError::config(format!(
                "Reference directory '{}' does not exist",
                self.reference_dir.display()
            ))
            .into());
        }

        if !self.delimiter.is_ascii() || self.delimiter == '\n' {
            return Err(LabError::config(format!(
                "Output delimiter must be a single ASCII character, got '{}'",
                self.delimiter.escape_default()
            ))
            .into());
        }

        Ok(())
    }

    /// Delimiter as the byte the writers expect
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b'|')
    }

    /// `<output dir>/<input file name>.diagnostics`
    pub fn diagnostics_path(&self) -> PathBuf {
        self.companion_path(DIAGNOSTICS_EXTENSION)
    }

    /// `<output dir>/<input file name>.error`
    pub fn error_path(&self) -> PathBuf {
        self.companion_path(ERROR_EXTENSION)
    }

    fn companion_path(&self, extension: &str) -> PathBuf {
        let name = self
            .input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "labload".to_string());
        self.output_dir.join(format!("{}.{}", name, extension))
    }
}

/// Parse a delimiter argument: exactly one character, with `\t` and `tab`
/// accepted for a tab.
pub fn parse_delimiter(value: &str) -> std::result::Result<char, String> {
    if matches!(value, "\\t" | "tab") {
        return Ok('\t');
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(format!("delimiter must be one ASCII character, got '{}'", value)),
    }
}
