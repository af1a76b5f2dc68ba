//! Identifier resolution
//!
//! Maps human-readable identifiers (J: numbers, MGI IDs, user logins,
//! vocabulary terms) to surrogate keys. Every outcome is cached for the rest
//! of the run, so the backing store is consulted at most once per identifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use labload_common::Key;

use crate::error::Result;

/// Namespace an external identifier is resolved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    User,
    Reference,
    Marker,
    Probe,
    Library,
    Source,
    Organism,
    Strain,
    Tissue,
    Gender,
    CellLine,
    VectorType,
    SegmentType,
    LogicalDb,
}

impl IdentifierKind {
    pub const ALL: [IdentifierKind; 14] = [
        IdentifierKind::User,
        IdentifierKind::Reference,
        IdentifierKind::Marker,
        IdentifierKind::Probe,
        IdentifierKind::Library,
        IdentifierKind::Source,
        IdentifierKind::Organism,
        IdentifierKind::Strain,
        IdentifierKind::Tissue,
        IdentifierKind::Gender,
        IdentifierKind::CellLine,
        IdentifierKind::VectorType,
        IdentifierKind::SegmentType,
        IdentifierKind::LogicalDb,
    ];

    /// Name used in diagnostics and error messages
    pub fn label(self) -> &'static str {
        match self {
            IdentifierKind::User => "User",
            IdentifierKind::Reference => "Reference",
            IdentifierKind::Marker => "Marker",
            IdentifierKind::Probe => "Probe",
            IdentifierKind::Library => "Library",
            IdentifierKind::Source => "Source",
            IdentifierKind::Organism => "Organism",
            IdentifierKind::Strain => "Strain",
            IdentifierKind::Tissue => "Tissue",
            IdentifierKind::Gender => "Gender",
            IdentifierKind::CellLine => "Cell Line",
            IdentifierKind::VectorType => "Vector Type",
            IdentifierKind::SegmentType => "Segment Type",
            IdentifierKind::LogicalDb => "Logical DB",
        }
    }

    /// File stem of this namespace in a reference catalog directory
    pub fn file_stem(self) -> &'static str {
        match self {
            IdentifierKind::User => "user",
            IdentifierKind::Reference => "reference",
            IdentifierKind::Marker => "marker",
            IdentifierKind::Probe => "probe",
            IdentifierKind::Library => "library",
            IdentifierKind::Source => "source",
            IdentifierKind::Organism => "organism",
            IdentifierKind::Strain => "strain",
            IdentifierKind::Tissue => "tissue",
            IdentifierKind::Gender => "gender",
            IdentifierKind::CellLine => "cell_line",
            IdentifierKind::VectorType => "vector_type",
            IdentifierKind::SegmentType => "segment_type",
            IdentifierKind::LogicalDb => "logical_db",
        }
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reference data the resolver falls back to on a cache miss
pub trait ReferenceStore {
    /// Every key recorded for `external_id` in the `kind` namespace.
    ///
    /// More than one distinct key means the reference data itself is in
    /// conflict (two objects claiming the same identifier).
    fn lookup(&self, kind: IdentifierKind, external_id: &str) -> Result<Vec<Key>>;
}

/// Outcome of resolving one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Found(Key),
    NotFound,
    Duplicate(Vec<Key>),
}

impl Resolution {
    pub fn key(&self) -> Option<Key> {
        match self {
            Resolution::Found(key) => Some(*key),
            Resolution::NotFound | Resolution::Duplicate(_) => None,
        }
    }
}

/// A backing lookup the resolver performed, kept for the diagnostics file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub kind: IdentifierKind,
    pub external_id: String,
    pub resolution: Resolution,
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resolution {
            Resolution::Found(key) => write!(f, "{} {} -> {}", self.kind, self.external_id, key),
            Resolution::NotFound => write!(f, "{} {} -> not found", self.kind, self.external_id),
            Resolution::Duplicate(keys) => write!(
                f,
                "{} {} -> duplicate ({})",
                self.kind,
                self.external_id,
                keys.iter().map(Key::to_string).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// Caching identifier resolver
pub struct Resolver<S> {
    store: S,
    cache: HashMap<IdentifierKind, HashMap<String, Resolution>>,
    backing_lookups: usize,
    pending: Vec<Lookup>,
}

impl<S: ReferenceStore> Resolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            backing_lookups: 0,
            pending: Vec::new(),
        }
    }

    /// Resolve `external_id` within `kind`.
    ///
    /// Surrounding whitespace is ignored. A store error is fatal; a missing
    /// or conflicting identifier is an ordinary [`Resolution`].
    pub fn resolve(&mut self, kind: IdentifierKind, external_id: &str) -> Result<Resolution> {
        let external_id = external_id.trim();

        if let Some(hit) = self.cache.get(&kind).and_then(|ns| ns.get(external_id)) {
            return Ok(hit.clone());
        }

        self.backing_lookups += 1;
        let mut keys = self.store.lookup(kind, external_id)?;
        keys.sort_unstable();
        keys.dedup();

        let resolution = match keys.as_slice() {
            [] => Resolution::NotFound,
            [key] => Resolution::Found(*key),
            _ => Resolution::Duplicate(keys),
        };
        debug!(kind = %kind, external_id, resolution = ?resolution, "Backing lookup");

        self.cache
            .entry(kind)
            .or_default()
            .insert(external_id.to_string(), resolution.clone());
        self.pending.push(Lookup {
            kind,
            external_id: external_id.to_string(),
            resolution: resolution.clone(),
        });

        Ok(resolution)
    }

    /// Backing lookups performed since the last call, oldest first.
    pub fn drain_lookups(&mut self) -> Vec<Lookup> {
        std::mem::take(&mut self.pending)
    }

    /// Number of times the backing store has been consulted this run.
    pub fn backing_lookups(&self) -> usize {
        self.backing_lookups
    }

    /// Number of cached identifiers across all namespaces.
    pub fn cached(&self) -> usize {
        self.cache.values().map(HashMap::len).sum()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
