//! Run driver
//!
//! Drives one load run through its states:
//!
//! ```text
//! Init -> KeysAllocated -> Processing (validate -> emit | skip) -> Finalize -> Done
//! ```
//!
//! Lines are handled strictly in input order, one at a time. A fatal error
//! at any point is written to the diagnostics and error files and returned;
//! nothing after it runs. Preview mode performs every step except advancing
//! the accession sequence and bulk loading.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use labload_common::{Key, LabError, RunMode};

use crate::config::LoadConfig;
use crate::diagnostics::RunLog;
use crate::emitter::{minting_prefix, Emitter};
use crate::error::{LoadError, Result};
use crate::keys::{KeyAllocator, KeySource};
use crate::loader::BulkLoader;
use crate::record::RecordReader;
use crate::resolver::{ReferenceStore, Resolver};
use crate::schema::{LoadSchema, LoadType};
use crate::streams::OutputStreams;
use crate::validator::{Validation, Validator};

/// Lifecycle of a run; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    KeysAllocated,
    Processing,
    Finalize,
    Done,
}

/// Final accession maximum of a minting run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessionMax {
    pub prefix: String,
    pub value: u64,
    /// Whether the backing store was advanced (load mode only)
    pub finalized: bool,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub load_type: LoadType,
    pub mode: RunMode,
    /// Input lines read
    pub lines_read: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Rows written per table
    pub rows: BTreeMap<String, u64>,
    /// Primary keys allocated, in input order
    pub primary_keys: Vec<Key>,
    pub accession_max: Option<AccessionMax>,
    /// Tables handed to the bulk loader, in load order
    pub loaded: Vec<String>,
}

/// Orchestrates validator, emitter, finalize and bulk loads for one input
pub struct RunDriver<R, K, L> {
    config: LoadConfig,
    schema: LoadSchema,
    resolver: Resolver<R>,
    key_source: K,
    loader: L,
    keys: KeyAllocator,
    state: RunState,
}

impl<R, K, L> RunDriver<R, K, L>
where
    R: ReferenceStore,
    K: KeySource,
    L: BulkLoader,
{
    pub fn new(config: LoadConfig, references: R, key_source: K, loader: L) -> Self {
        let schema = LoadSchema::for_load_type(config.load_type);
        Self {
            config,
            schema,
            resolver: Resolver::new(references),
            key_source,
            loader,
            keys: KeyAllocator::new(),
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyAllocator {
        &self.keys
    }

    pub fn resolver(&self) -> &Resolver<R> {
        &self.resolver
    }

    pub fn key_source(&self) -> &K {
        &self.key_source
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Run over the configured input file. An input file that cannot be
    /// opened aborts the run like any other fatal error.
    pub fn run_file(&mut self) -> Result<RunSummary> {
        let path = self.config.input_file.clone();
        self.run_with(|| File::open(&path).map_err(|_| LoadError::InputNotFound(path.clone())))
    }

    /// Run over `input`. Diagnostics and error files are always written,
    /// including when the run aborts.
    pub fn run<I: Read>(&mut self, input: I) -> Result<RunSummary> {
        self.run_with(|| Ok(input))
    }

    fn run_with<I: Read>(&mut self, open: impl FnOnce() -> Result<I>) -> Result<RunSummary> {
        if self.state != RunState::Init {
            return Err(LabError::config("a run driver can only be run once").into());
        }

        let mut log = RunLog::create(&self.config.diagnostics_path(), &self.config.error_path())?;

        match open().and_then(|input| self.execute(input, &mut log)) {
            Ok(summary) => {
                log.finish()?;
                info!(
                    load_type = %summary.load_type,
                    mode = %summary.mode,
                    lines = summary.lines_read,
                    accepted = summary.accepted,
                    rejected = summary.rejected,
                    "Load run complete"
                );
                Ok(summary)
            },
            Err(err) => {
                error!(error = %err, state = ?self.state, "Load run aborted");
                if let Err(log_err) = log.fatal(&err).and_then(|()| log.finish()) {
                    warn!(error = %log_err, "Could not record fatal error");
                }
                Err(err)
            },
        }
    }

    fn execute<I: Read>(&mut self, input: I, log: &mut RunLog) -> Result<RunSummary> {
        info!(
            load_type = %self.config.load_type,
            mode = %self.config.mode,
            input = %self.config.input_file.display(),
            "Starting load run"
        );
        log.note(format_args!("Load Type: {}", self.config.load_type))?;
        log.note(format_args!("Mode: {}", self.config.mode))?;
        log.note(format_args!("Input File: {}", self.config.input_file.display()))?;
        log.note(format_args!("Output Directory: {}", self.config.output_dir.display()))?;
        log.note(format_args!("Reference Directory: {}", self.config.reference_dir.display()))?;
        log.note(format_args!("Load Date: {}", self.config.load_date))?;

        self.initialize_keys(log)?;

        let mut out = OutputStreams::create(
            &self.config.output_dir,
            &self.schema.streams,
            self.config.delimiter_byte(),
        )?;
        let counts = self.process(input, &mut out, log)?;

        let rows: BTreeMap<String, u64> = out
            .rows()
            .map(|(stream, count)| (stream.table_name().to_string(), count))
            .collect();
        let closed = out.finish()?;

        self.state = RunState::Finalize;
        let accession_max = self.finalize(log)?;

        let mut loaded = Vec::new();
        for stream in self.schema.streams.iter().filter(|s| s.is_loadable()) {
            let Some((_, path)) = closed.iter().find(|(s, _)| s == stream) else {
                continue;
            };
            if self.config.mode.is_load() {
                let description = self.loader.load(*stream, path)?;
                log.note(format_args!("Bulk load {}: {}", stream, description))?;
                loaded.push(stream.table_name().to_string());
            } else {
                log.note(format_args!(
                    "Preview mode: {} not loaded ({})",
                    stream,
                    path.display()
                ))?;
            }
        }

        self.state = RunState::Done;
        Ok(RunSummary {
            load_type: self.config.load_type,
            mode: self.config.mode,
            lines_read: counts.lines,
            accepted: counts.accepted,
            rejected: counts.rejected,
            rows,
            primary_keys: counts.primary_keys,
            accession_max,
            loaded,
        })
    }

    fn initialize_keys(&mut self, log: &mut RunLog) -> Result<()> {
        for entity in self.schema.key_counters.iter().copied() {
            let next = self.keys.initialize(&self.key_source, entity)?;
            log.note(format_args!("Initial {} key: {}", entity, next))?;
        }
        if let Some(prefix) = minting_prefix(&self.schema) {
            let next = self.keys.initialize_accession(&self.key_source, prefix)?;
            log.note(format_args!("Initial {} accession: {}{}", prefix, prefix, next))?;
        }
        self.state = RunState::KeysAllocated;
        Ok(())
    }

    fn process<I: Read>(
        &mut self,
        input: I,
        out: &mut OutputStreams,
        log: &mut RunLog,
    ) -> Result<RecordCounts> {
        self.state = RunState::Processing;

        let validator = Validator::new(self.schema.clone());
        let emitter = Emitter::new(&self.schema, self.config.load_date);
        let mut reader = RecordReader::new(input);
        let progress = progress_spinner(self.config.show_progress);
        let mut counts = RecordCounts::default();

        while let Some(record) = reader.next_record()? {
            let line = record.line();
            counts.lines += 1;

            let validation = validator.validate(&record, &mut self.resolver)?;
            for lookup in self.resolver.drain_lookups() {
                log.note(format_args!("Line {}: lookup {}", line, lookup))?;
            }

            match validation {
                Validation::Accepted(valid) => {
                    let emitted = emitter.emit(&valid, &mut self.keys, out)?;
                    debug!(line, keys = %emitted.describe(), "Record accepted");
                    log.note(format_args!("Line {}: {}", line, emitted.describe()))?;
                    counts.accepted += 1;
                    counts.primary_keys.extend(emitted.primary_key);
                },
                Validation::Rejected(errors) => {
                    warn!(line, problems = errors.len(), "Record rejected");
                    for problem in &errors {
                        log.record_error(line, problem)?;
                    }
                    counts.rejected += 1;
                },
            }

            progress.inc(1);
            progress.set_message(format!("{} accepted, {} rejected", counts.accepted, counts.rejected));
        }

        progress.finish_and_clear();
        log.note(format_args!(
            "Lines read: {}, accepted: {}, rejected: {}",
            counts.lines, counts.accepted, counts.rejected
        ))?;
        log.note(format_args!(
            "Backing lookups: {}, cached identifiers: {}",
            self.resolver.backing_lookups(),
            self.resolver.cached()
        ))?;
        Ok(counts)
    }

    /// Advance the accession sequence once for the whole run.
    fn finalize(&mut self, log: &mut RunLog) -> Result<Option<AccessionMax>> {
        let Some((prefix, value)) = self
            .keys
            .accession_max()
            .map(|(prefix, value)| (prefix.to_string(), value))
        else {
            return Ok(None);
        };

        log.note(format_args!("Accession IDs minted: {}", self.keys.minted_accessions()))?;
        let finalized = self.config.mode.is_load();
        if finalized {
            self.key_source.set_max_numeric_part(&prefix, value)?;
            log.note(format_args!("Finalize: {} accession maximum set to {}", prefix, value))?;
        } else {
            log.note(format_args!(
                "Preview mode: {} accession maximum {} not finalized",
                prefix, value
            ))?;
        }

        Ok(Some(AccessionMax {
            prefix,
            value,
            finalized,
        }))
    }
}

#[derive(Debug, Default)]
struct RecordCounts {
    lines: u64,
    accepted: u64,
    rejected: u64,
    primary_keys: Vec<Key>,
}

fn progress_spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} lines ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
