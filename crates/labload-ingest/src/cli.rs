//! Command-line interface
//!
//! Every option can also come from the environment (or a `.env` file loaded
//! by the binary), so scheduled loads can be configured without arguments.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use labload_common::types::LoadDate;
use labload_common::RunMode;

use crate::config::{parse_delimiter, LoadConfig, DEFAULT_DELIMITER};
use crate::error::Result;
use crate::schema::LoadType;

#[derive(Parser, Debug)]
#[command(name = "labload")]
#[command(author, version, about = "Validate probe data and produce bulk-load files")]
pub struct Cli {
    /// Kind of input file to load
    #[arg(value_enum)]
    pub load_type: LoadType,

    /// Tab-delimited input file
    #[arg(short, long, env = "LABLOAD_INPUT_FILE")]
    pub input: PathBuf,

    /// Directory for bulk-load, diagnostics and error files
    #[arg(short, long, env = "LABLOAD_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory of reference data snapshots
    #[arg(short, long, env = "LABLOAD_REFERENCE_DIR")]
    pub reference_dir: PathBuf,

    /// Processing mode: preview (dry-run) or load (full)
    #[arg(short, long, env = "LABLOAD_MODE", default_value = "preview")]
    pub mode: String,

    /// Delimiter of bulk-load files
    #[arg(long, env = "LABLOAD_DELIMITER", default_value_t = DEFAULT_DELIMITER, value_parser = parse_delimiter)]
    pub delimiter: char,

    /// Bulk-load command template, e.g. "bcpin {table} {file}"
    #[arg(long, env = "LABLOAD_BULK_COMMAND")]
    pub bulk_command: Option<String>,

    /// Date stamped into emitted rows (YYYY-MM-DD, default today)
    #[arg(long)]
    pub load_date: Option<NaiveDate>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration. An unknown mode is fatal.
    pub fn into_config(&self) -> Result<LoadConfig> {
        let mode: RunMode = self.mode.parse()?;

        let mut config = LoadConfig::new(
            self.load_type,
            mode,
            &self.input,
            &self.output_dir,
            &self.reference_dir,
        )
        .with_delimiter(self.delimiter)
        .with_progress(self.progress);

        if let Some(command) = &self.bulk_command {
            config = config.with_bulk_command(command.clone());
        }
        if let Some(date) = self.load_date {
            config = config.with_load_date(LoadDate::new(date));
        }
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use labload_common::LabError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("labload").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = parse(&[
            "probe-marker",
            "--input",
            "markers.txt",
            "--output-dir",
            "out",
            "--reference-dir",
            "ref",
            "--mode",
            "load",
            "--delimiter",
            "tab",
            "--load-date",
            "2024-03-01",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.load_type, LoadType::ProbeMarker);
        assert_eq!(config.mode, RunMode::Load);
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.load_date.to_string(), "03/01/2024");
        assert_eq!(config.bulk_command, None);
    }

    #[test]
    fn test_mode_aliases() {
        let cli = parse(&["probe", "-i", "a", "-r", "ref", "--mode", "dry-run"]);
        assert_eq!(cli.into_config().unwrap().mode, RunMode::Preview);

        let cli = parse(&["probe", "-i", "a", "-r", "ref", "--mode", "full"]);
        assert_eq!(cli.into_config().unwrap().mode, RunMode::Load);
    }

    #[test]
    fn test_unknown_mode_is_fatal() {
        let cli = parse(&["probe", "-i", "a", "-r", "ref", "--mode", "incremental"]);
        let err = cli.into_config().unwrap_err();
        assert!(matches!(err, LoadError::Common(LabError::InvalidMode(_))));
    }

    #[test]
    fn test_unknown_load_type_is_rejected() {
        let result = Cli::try_parse_from(["labload", "probeassay", "-i", "a", "-r", "ref"]);
        assert!(result.is_err());
    }
}
