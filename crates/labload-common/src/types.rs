//! Common types used across labload

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LabError;

/// Internal surrogate key of a database row.
pub type Key = i64;

/// Key written for "not applicable" foreign keys (e.g. the source of a primer).
pub const NOT_APPLICABLE: Key = -2;

/// Processing mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Validate and write every output file, but never touch the database
    #[default]
    Preview,
    /// Additionally advance the accession sequence and bulk-load the files
    Load,
}

impl RunMode {
    /// Whether destructive side effects (finalize, physical load) are issued
    pub fn is_load(self) -> bool {
        matches!(self, RunMode::Load)
    }
}

impl std::str::FromStr for RunMode {
    type Err = LabError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preview" | "dry-run" | "dryrun" => Ok(RunMode::Preview),
            "load" | "full" => Ok(RunMode::Load),
            _ => Err(LabError::InvalidMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Preview => write!(f, "preview"),
            RunMode::Load => write!(f, "load"),
        }
    }
}

/// Date stamped into creation/modification columns of every emitted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDate(NaiveDate);

impl LoadDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }
}

impl std::fmt::Display for LoadDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%m/%d/%Y"))
    }
}
