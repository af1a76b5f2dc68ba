//! File-backed reference data
//!
//! A reference directory holds tab-delimited snapshots of the database
//! tables the pipeline reads from:
//!
//! - `<kind>.tsv` per identifier namespace (`reference.tsv`, `marker.tsv`,
//!   `logical_db.tsv`, ...), rows `external_id<TAB>key`
//! - `max_keys.tsv`, rows `entity<TAB>max_key`
//! - `accession_max.tsv`, rows `prefix<TAB>max_numeric`
//!
//! Missing files are empty tables. Lines starting with `#` are comments.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use labload_common::Key;

use crate::error::{LoadError, Result};
use crate::keys::{EntityType, KeySource};
use crate::resolver::{IdentifierKind, ReferenceStore};

const MAX_KEYS_FILE: &str = "max_keys.tsv";
const ACCESSION_MAX_FILE: &str = "accession_max.tsv";

/// Identifier lookups backed by `<kind>.tsv` snapshots
#[derive(Debug, Clone, Default)]
pub struct IdentifierCatalog {
    namespaces: HashMap<IdentifierKind, HashMap<String, Vec<Key>>>,
}

impl IdentifierCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every identifier namespace found in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();

        for kind in IdentifierKind::ALL {
            let path = dir.join(format!("{}.tsv", kind.file_stem()));
            let Some(rows) = read_pairs(&path)? else {
                continue;
            };
            for (line, external_id, key) in rows {
                let key = key.parse::<Key>().map_err(|_| {
                    LoadError::catalog(format!(
                        "{}:{}: invalid key '{}' for '{}'",
                        path.display(),
                        line,
                        key,
                        external_id
                    ))
                })?;
                catalog.insert(kind, &external_id, key);
            }
            debug!(kind = %kind, entries = catalog.len(kind), "Loaded identifier namespace");
        }

        Ok(catalog)
    }

    /// Add an identifier; adding the same identifier again with another key
    /// records a conflict.
    pub fn with_identifier(mut self, kind: IdentifierKind, external_id: &str, key: Key) -> Self {
        self.insert(kind, external_id, key);
        self
    }

    pub fn insert(&mut self, kind: IdentifierKind, external_id: &str, key: Key) {
        self.namespaces
            .entry(kind)
            .or_default()
            .entry(external_id.trim().to_string())
            .or_default()
            .push(key);
    }

    /// Number of distinct identifiers in `kind`
    pub fn len(&self, kind: IdentifierKind) -> usize {
        self.namespaces.get(&kind).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(HashMap::is_empty)
    }
}

impl ReferenceStore for IdentifierCatalog {
    fn lookup(&self, kind: IdentifierKind, external_id: &str) -> Result<Vec<Key>> {
        Ok(self
            .namespaces
            .get(&kind)
            .and_then(|ns| ns.get(external_id))
            .cloned()
            .unwrap_or_default())
    }
}

/// Key maxima and accession sequences backed by `max_keys.tsv` and
/// `accession_max.tsv`
#[derive(Debug, Clone, Default)]
pub struct KeyCatalog {
    max_keys: BTreeMap<EntityType, Key>,
    accession_max: BTreeMap<String, u64>,
    /// Directory the accession sequence is persisted to, if any
    dir: Option<PathBuf>,
}

impl KeyCatalog {
    /// In-memory catalog; finalization is not persisted.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(dir: &Path) -> Result<Self> {
        let mut catalog = Self {
            dir: Some(dir.to_path_buf()),
            ..Self::default()
        };

        let max_keys = dir.join(MAX_KEYS_FILE);
        for (line, entity, max) in read_pairs(&max_keys)?.unwrap_or_default() {
            let entity: EntityType = entity.parse()?;
            let max = max.parse::<Key>().map_err(|_| {
                LoadError::catalog(format!("{}:{}: invalid key '{}'", max_keys.display(), line, max))
            })?;
            catalog.max_keys.insert(entity, max);
        }

        let accession_max = dir.join(ACCESSION_MAX_FILE);
        for (line, prefix, max) in read_pairs(&accession_max)?.unwrap_or_default() {
            let max = max.parse::<u64>().map_err(|_| {
                LoadError::catalog(format!(
                    "{}:{}: invalid maximum '{}'",
                    accession_max.display(),
                    line,
                    max
                ))
            })?;
            catalog.accession_max.insert(prefix, max);
        }

        debug!(
            max_keys = catalog.max_keys.len(),
            prefixes = catalog.accession_max.len(),
            "Loaded key catalog"
        );
        Ok(catalog)
    }

    pub fn with_max_key(mut self, entity: EntityType, max: Key) -> Self {
        self.max_keys.insert(entity, max);
        self
    }

    pub fn with_accession_max(mut self, prefix: &str, max: u64) -> Self {
        self.accession_max.insert(prefix.to_string(), max);
        self
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        let path = dir.join(ACCESSION_MAX_FILE);
        let file = File::create(&path).map_err(|source| LoadError::OutputOpen {
            path: path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        for (prefix, max) in &self.accession_max {
            writer.write_record([prefix.as_str(), &max.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl KeySource for KeyCatalog {
    fn max_key(&self, entity: EntityType) -> Result<Option<Key>> {
        Ok(self.max_keys.get(&entity).copied())
    }

    fn max_numeric_part(&self, prefix: &str) -> Result<Option<u64>> {
        Ok(self.accession_max.get(prefix).copied())
    }

    fn set_max_numeric_part(&mut self, prefix: &str, value: u64) -> Result<()> {
        self.accession_max.insert(prefix.to_string(), value);
        if let Some(dir) = &self.dir {
            self.persist(dir)?;
            info!(prefix, value, path = %dir.join(ACCESSION_MAX_FILE).display(), "Advanced accession sequence");
        }
        Ok(())
    }
}

/// Read `first<TAB>second` rows, or `None` if the file does not exist.
fn read_pairs(path: &Path) -> Result<Option<Vec<(u64, String, String)>>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        match (record.get(0), record.get(1)) {
            (Some(first), Some(second)) => {
                rows.push((line, first.trim().to_string(), second.trim().to_string()))
            },
            _ => {
                return Err(LoadError::catalog(format!(
                    "{}:{}: expected two tab-separated columns",
                    path.display(),
                    line
                )))
            },
        }
    }
    Ok(Some(rows))
}
