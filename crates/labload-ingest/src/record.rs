//! Input records and sub-field syntax
//!
//! Input files are tab-delimited, one record per line. Within a field, `|`
//! separates list entries and `:` separates a logical DB from an accession
//! ID. Structural problems here are fatal for the whole run.

use std::io::{BufRead, BufReader, Read};

use crate::error::{LoadError, Result};
use crate::schema::{FieldSource, LoadSchema};

/// Separator of list entries within one field
pub const LIST_SEPARATOR: char = '|';

/// One line of the input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    line: u64,
    fields: Vec<String>,
    /// Columns that were not valid UTF-8, decoded lossily
    undecodable: Vec<usize>,
}

impl InputRecord {
    pub fn new(line: u64, fields: Vec<String>) -> Self {
        Self {
            line,
            fields,
            undecodable: Vec::new(),
        }
    }

    /// Parse a raw line (without its terminator).
    pub fn from_line(line: u64, raw: &str) -> Self {
        Self::new(line, raw.split('\t').map(str::to_string).collect())
    }

    /// Parse a raw line of bytes (without its terminator). Columns that are
    /// not valid UTF-8 are kept lossily decoded and flagged.
    pub fn from_bytes(line: u64, raw: &[u8]) -> Self {
        let mut fields = Vec::new();
        let mut undecodable = Vec::new();
        for (idx, column) in raw.split(|b| *b == b'\t').enumerate() {
            match std::str::from_utf8(column) {
                Ok(text) => fields.push(text.to_string()),
                Err(_) => {
                    undecodable.push(idx);
                    fields.push(String::from_utf8_lossy(column).into_owned());
                },
            }
        }
        Self {
            line,
            fields,
            undecodable,
        }
    }

    /// 1-based line number in the input file
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The line as it appeared in the input
    pub fn raw(&self) -> String {
        self.fields.join("\t")
    }

    /// Fail unless the line has every column `schema` reads.
    ///
    /// Extra trailing columns are ignored. A blank line has a single empty
    /// column, so it fails like any other short line.
    pub fn check_shape(&self, schema: &LoadSchema) -> Result<()> {
        if self.fields.len() < schema.column_count() {
            return Err(LoadError::MalformedLine {
                line: self.line,
                content: self.raw(),
            });
        }
        Ok(())
    }

    /// Whether the value behind `source` was valid UTF-8.
    pub fn is_decoded(&self, source: FieldSource) -> bool {
        match source {
            FieldSource::Column(idx) => !self.undecodable.contains(&idx),
            FieldSource::Constant(_) => true,
        }
    }

    /// Raw value of a field; constants come from the schema.
    pub fn value(&self, source: FieldSource) -> &str {
        match source {
            FieldSource::Column(idx) => self.fields.get(idx).map_or("", String::as_str),
            FieldSource::Constant(value) => value,
        }
    }
}

/// Trimmed entries of a `separator`-separated identifier list. Empty
/// entries (e.g. from a trailing separator) carry no value and are skipped.
pub fn sublist(value: &str, separator: char) -> impl Iterator<Item = &str> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// A sequence accession reference from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceId<'a> {
    pub logical_db: &'a str,
    pub acc_id: &'a str,
}

/// Parse one sequence ID list entry.
///
/// With a default logical DB the entry is a bare accession ID. Otherwise it
/// must read `LogicalDB:AccID`; anything else is a corrupt file.
pub fn parse_sequence_id<'a>(
    entry: &'a str,
    default_logical_db: Option<&'a str>,
    line: u64,
) -> Result<SequenceId<'a>> {
    if let Some(logical_db) = default_logical_db {
        return Ok(SequenceId {
            logical_db,
            acc_id: entry,
        });
    }

    match entry.split_once(':') {
        Some((logical_db, acc_id)) if !logical_db.trim().is_empty() && !acc_id.trim().is_empty() => {
            Ok(SequenceId {
                logical_db: logical_db.trim(),
                acc_id: acc_id.trim(),
            })
        },
        _ => Err(LoadError::MalformedSubField {
            line,
            field: "Sequence ID".to_string(),
            value: entry.to_string(),
        }),
    }
}

/// Streams [`InputRecord`]s from a tab-delimited reader, in file order.
pub struct RecordReader<R: Read> {
    inner: BufReader<R>,
    buffer: Vec<u8>,
    line: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            inner: BufReader::new(input),
            buffer: Vec::new(),
            line: 0,
        }
    }

    /// Next record, or `None` at end of input. Every line counts, blank or
    /// not, and a `\r\n` terminator is accepted.
    pub fn next_record(&mut self) -> Result<Option<InputRecord>> {
        self.buffer.clear();
        if self.inner.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line += 1;

        let mut raw = self.buffer.as_slice();
        if let Some(rest) = raw.strip_suffix(b"\n") {
            raw = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        Ok(Some(InputRecord::from_bytes(self.line, raw)))
    }
}
