//! Output streams
//!
//! One flat file per target table, written as fixed-order delimited rows
//! with empty strings for nulls. Files are created when the run starts and
//! flushed and closed before any bulk load is issued.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LoadError, Result};

/// Target of an output row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Probe,
    Marker,
    Reference,
    Accession,
    AccessionReference,
    Notes,
    Alias,
    /// Tab-delimited echo of every new probe with its minted MGI ID; a
    /// report for curators, never bulk loaded
    NewProbeReport,
}

impl Stream {
    /// Database table the stream is loaded into
    pub fn table_name(self) -> &'static str {
        match self {
            Stream::Probe => "PRB_Probe",
            Stream::Marker => "PRB_Marker",
            Stream::Reference => "PRB_Reference",
            Stream::Accession => "ACC_Accession",
            Stream::AccessionReference => "ACC_AccessionReference",
            Stream::Notes => "PRB_Notes",
            Stream::Alias => "PRB_Alias",
            Stream::NewProbeReport => "newProbe",
        }
    }

    pub fn file_name(self) -> String {
        match self {
            Stream::NewProbeReport => "newProbe.txt".to_string(),
            _ => format!("{}.bcp", self.table_name()),
        }
    }

    /// Whether the stream is handed to the bulk loader
    pub fn is_loadable(self) -> bool {
        !matches!(self, Stream::NewProbeReport)
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

struct StreamFile {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
}

/// The set of open output files of one run
pub struct OutputStreams {
    files: BTreeMap<Stream, StreamFile>,
}

impl OutputStreams {
    /// Create (truncating) one file per stream in `dir`.
    ///
    /// Bulk-load streams use `delimiter`; the new-probe report is always
    /// tab-delimited.
    pub fn create(dir: &Path, streams: &[Stream], delimiter: u8) -> Result<Self> {
        let mut files = BTreeMap::new();

        for stream in streams {
            let path = dir.join(stream.file_name());
            let file = File::create(&path).map_err(|source| LoadError::OutputOpen {
                path: path.clone(),
                source,
            })?;

            let delimiter = if stream.is_loadable() { delimiter } else { b'\t' };
            let writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .flexible(true)
                .quote_style(csv::QuoteStyle::Never)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(file);

            debug!(table = stream.table_name(), path = %path.display(), "Opened output stream");
            files.insert(*stream, StreamFile { path, writer, rows: 0 });
        }

        Ok(Self { files })
    }

    /// Append one row to `stream`.
    pub fn write_row<I, T>(&mut self, stream: Stream, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let file = self
            .files
            .get_mut(&stream)
            .ok_or(LoadError::StreamNotOpen(stream.table_name()))?;
        file.writer.write_record(row)?;
        file.rows += 1;
        Ok(())
    }

    pub fn is_open(&self, stream: Stream) -> bool {
        self.files.contains_key(&stream)
    }

    /// Rows written per stream, in stream order
    pub fn rows(&self) -> impl Iterator<Item = (Stream, u64)> + '_ {
        self.files.iter().map(|(s, f)| (*s, f.rows))
    }

    /// Flush and close every file, returning the written paths.
    pub fn finish(self) -> Result<Vec<(Stream, PathBuf)>> {
        let mut closed = Vec::with_capacity(self.files.len());
        for (stream, mut file) in self.files {
            file.writer.flush()?;
            debug!(table = stream.table_name(), rows = file.rows, "Closed output stream");
            closed.push((stream, file.path));
        }
        Ok(closed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_names() {
        assert_eq!(Stream::Probe.file_name(), "PRB_Probe.bcp");
        assert_eq!(Stream::AccessionReference.file_name(), "ACC_AccessionReference.bcp");
        assert_eq!(Stream::NewProbeReport.file_name(), "newProbe.txt");
        assert!(!Stream::NewProbeReport.is_loadable());
        assert!(Stream::Alias.is_loadable());
    }

    #[test]
    fn test_rows_are_written_unquoted() {
        let dir = TempDir::new().unwrap();
        let mut streams = OutputStreams::create(dir.path(), &[Stream::Notes], b'|').unwrap();

        streams
            .write_row(Stream::Notes, ["1001", "1", "5' end \"quoted\"", "", "x"])
            .unwrap();
        streams.write_row(Stream::Notes, ["1001", "2", "more"]).unwrap();
        assert_eq!(streams.rows().collect::<Vec<_>>(), vec![(Stream::Notes, 2)]);

        let closed = streams.finish().unwrap();
        assert_eq!(closed.len(), 1);

        let content = std::fs::read_to_string(&closed[0].1).unwrap();
        assert_eq!(content, "1001|1|5' end \"quoted\"||x\n1001|2|more\n");
    }

    #[test]
    fn test_report_is_tab_delimited() {
        let dir = TempDir::new().unwrap();
        let mut streams =
            OutputStreams::create(dir.path(), &[Stream::NewProbeReport], b'|').unwrap();
        streams.write_row(Stream::NewProbeReport, ["a", "b"]).unwrap();
        streams.finish().unwrap();

        let content = std::fs::read_to_string(dir.path().join("newProbe.txt")).unwrap();
        assert_eq!(content, "a\tb\n");
    }

    #[test]
    fn test_unopened_stream_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut streams = OutputStreams::create(dir.path(), &[Stream::Probe], b'|').unwrap();

        let err = streams.write_row(Stream::Alias, ["1"]).unwrap_err();
        assert!(matches!(err, LoadError::StreamNotOpen("PRB_Alias")));
    }

    #[test]
    fn test_missing_output_dir_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = OutputStreams::create(&missing, &[Stream::Probe], b'|').err().unwrap();
        assert!(matches!(err, LoadError::OutputOpen { .. }));
    }
}
