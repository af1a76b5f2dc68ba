//! Declarative load-type schemas
//!
//! Every load type is one [`LoadSchema`]: an ordered list of field
//! descriptors that drives parsing and validation, plus the key counters it
//! allocates and the output streams it writes. The pipeline itself is the
//! same for all of them.

use serde::{Deserialize, Serialize};

use crate::keys::EntityType;
use crate::record::LIST_SEPARATOR;
use crate::resolver::IdentifierKind;
use crate::streams::Stream;

/// Field names shared by the schemas and the emitter.
pub mod fields {
    pub const NAME: &str = "name";
    pub const MARKER_SYMBOL: &str = "marker_symbol";
    pub const MGI_ID: &str = "mgi_id";
    pub const PROBE: &str = "probe";
    pub const REFERENCE: &str = "reference";
    pub const LIBRARY: &str = "library";
    pub const SOURCE: &str = "source";
    pub const ORGANISM: &str = "organism";
    pub const STRAIN: &str = "strain";
    pub const TISSUE: &str = "tissue";
    pub const GENDER: &str = "gender";
    pub const CELL_LINE: &str = "cell_line";
    pub const AGE: &str = "age";
    pub const VECTOR_TYPE: &str = "vector_type";
    pub const SEGMENT_TYPE: &str = "segment_type";
    pub const REGION_COVERED: &str = "region_covered";
    pub const INSERT_SITE: &str = "insert_site";
    pub const INSERT_SIZE: &str = "insert_size";
    pub const SEQUENCE_1: &str = "sequence_1";
    pub const SEQUENCE_2: &str = "sequence_2";
    pub const PRODUCT_SIZE: &str = "product_size";
    pub const MARKER: &str = "marker";
    pub const MARKERS: &str = "markers";
    pub const CLONES: &str = "clones";
    pub const RELATIONSHIP: &str = "relationship";
    pub const SEQUENCE_IDS: &str = "sequence_ids";
    pub const ALIASES: &str = "aliases";
    pub const NOTES: &str = "notes";
    pub const CREATED_BY: &str = "created_by";
}

/// Load types handled by the pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LoadType {
    /// New probes with markers, references, sequences and notes
    Probe,
    /// New primer pairs
    Primer,
    /// Clone collections with externally assigned MGI IDs
    Clone,
    /// Additional marker associations for existing probes
    ProbeMarker,
    /// Additional references and aliases for existing probes
    ProbeReference,
    /// Notes for existing probes
    ProbeNotes,
    /// A reference for existing probes, with optional markers and aliases
    ProbeExtras,
    /// Marker associations for FANTOM3 clones
    CloneMarker,
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadType::Probe => "probe",
            LoadType::Primer => "primer",
            LoadType::Clone => "clone",
            LoadType::ProbeMarker => "probe-marker",
            LoadType::ProbeReference => "probe-reference",
            LoadType::ProbeNotes => "probe-notes",
            LoadType::ProbeExtras => "probe-extras",
            LoadType::CloneMarker => "clone-marker",
        };
        write!(f, "{}", name)
    }
}

/// How a field's raw value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Copied through as-is
    Text,
    /// One external identifier resolved to a key
    Identifier(IdentifierKind),
    /// Identifiers joined by `separator`, each resolved to a key. An entry
    /// equal to `placeholder` ends the list.
    IdentifierList {
        kind: IdentifierKind,
        separator: char,
        placeholder: Option<&'static str>,
    },
    /// `|`-separated sequence accessions. Entries are `LogicalDB:AccID`
    /// unless a default logical DB is given, in which case they are bare
    /// accession IDs belonging to it.
    SequenceIds {
        default_logical_db: Option<&'static str>,
    },
    /// `|`-separated free-text aliases, kept verbatim
    AliasList,
    /// An accession ID assigned outside this load
    AccessionId,
}

/// Where a field's raw value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Zero-based tab-separated column of the input line
    Column(usize),
    /// Fixed for every record of this load type
    Constant(&'static str),
}

/// One field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Human-readable name used in error messages
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub source: FieldSource,
}

impl FieldSpec {
    fn column(
        name: &'static str,
        label: &'static str,
        kind: FieldKind,
        required: bool,
        column: usize,
    ) -> Self {
        Self {
            name,
            label,
            kind,
            required,
            source: FieldSource::Column(column),
        }
    }

    fn constant(name: &'static str, label: &'static str, kind: FieldKind, value: &'static str) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
            source: FieldSource::Constant(value),
        }
    }
}

/// Source resolution for probes: a named library, or, when the library
/// column is empty, an anonymous source described by its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRule {
    pub library: &'static str,
    /// Vocabulary fields that become required when no library is named
    pub attributes: Vec<&'static str>,
    /// Free-text field appended to the anonymous source descriptor
    pub age: &'static str,
}

impl SourceRule {
    pub fn is_attribute(&self, field: &str) -> bool {
        self.attributes.iter().any(|a| *a == field)
    }
}

/// Complete description of one load type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSchema {
    pub load_type: LoadType,
    pub fields: Vec<FieldSpec>,
    /// Counters initialized from the backing store before the first record
    pub key_counters: Vec<EntityType>,
    /// Output streams, in bulk-load order
    pub streams: Vec<Stream>,
    /// Whether every accepted record receives a newly minted `MGI:` ID
    pub mints_accession: bool,
    pub source_rule: Option<SourceRule>,
}

impl LoadSchema {
    pub fn for_load_type(load_type: LoadType) -> Self {
        match load_type {
            LoadType::Probe => probe_schema(),
            LoadType::Primer => primer_schema(),
            LoadType::Clone => clone_schema(),
            LoadType::ProbeMarker => probe_marker_schema(),
            LoadType::ProbeReference => probe_reference_schema(),
            LoadType::ProbeNotes => probe_notes_schema(),
            LoadType::ProbeExtras => probe_extras_schema(),
            LoadType::CloneMarker => clone_marker_schema(),
        }
    }

    /// Minimum number of tab-separated fields an input line must have.
    pub fn column_count(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| match f.source {
                FieldSource::Column(idx) => Some(idx + 1),
                FieldSource::Constant(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn probe_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::Probe,
        fields: vec![
            FieldSpec::column(NAME, "Probe Name", Text, true, 0),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 1),
            FieldSpec::column(LIBRARY, "Library", Identifier(Id::Library), false, 2),
            FieldSpec::column(ORGANISM, "Organism", Identifier(Id::Organism), false, 3),
            FieldSpec::column(STRAIN, "Strain", Identifier(Id::Strain), false, 4),
            FieldSpec::column(TISSUE, "Tissue", Identifier(Id::Tissue), false, 5),
            FieldSpec::column(GENDER, "Gender", Identifier(Id::Gender), false, 6),
            FieldSpec::column(CELL_LINE, "Cell Line", Identifier(Id::CellLine), false, 7),
            FieldSpec::column(AGE, "Age", Text, false, 8),
            FieldSpec::column(VECTOR_TYPE, "Vector Type", Identifier(Id::VectorType), true, 9),
            FieldSpec::column(SEGMENT_TYPE, "Segment Type", Identifier(Id::SegmentType), true, 10),
            FieldSpec::column(REGION_COVERED, "Region Covered", Text, false, 11),
            FieldSpec::column(INSERT_SITE, "Insert Site", Text, false, 12),
            FieldSpec::column(INSERT_SIZE, "Insert Size", Text, false, 13),
            FieldSpec::column(MARKER, "Marker", Identifier(Id::Marker), true, 14),
            FieldSpec::column(RELATIONSHIP, "Relationship", Text, false, 15),
            FieldSpec::column(
                SEQUENCE_IDS,
                "Sequence ID",
                SequenceIds {
                    default_logical_db: None,
                },
                false,
                16,
            ),
            FieldSpec::column(NOTES, "Notes", Text, false, 17),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 18),
        ],
        key_counters: vec![EntityType::Probe, EntityType::Reference, EntityType::Accession],
        streams: vec![
            Stream::Probe,
            Stream::Marker,
            Stream::Reference,
            Stream::Accession,
            Stream::AccessionReference,
            Stream::Notes,
            Stream::NewProbeReport,
        ],
        mints_accession: true,
        source_rule: Some(SourceRule {
            library: LIBRARY,
            attributes: vec![ORGANISM, STRAIN, TISSUE, GENDER, CELL_LINE],
            age: AGE,
        }),
    }
}

fn primer_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::Primer,
        fields: vec![
            FieldSpec::column(MARKER_SYMBOL, "Marker Symbol", Text, false, 0),
            FieldSpec::column(MARKER, "Marker", Identifier(Id::Marker), true, 1),
            FieldSpec::column(NAME, "Primer Name", Text, true, 2),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 3),
            FieldSpec::column(REGION_COVERED, "Region Covered", Text, false, 4),
            FieldSpec::column(SEQUENCE_1, "Sequence 1", Text, false, 5),
            FieldSpec::column(SEQUENCE_2, "Sequence 2", Text, false, 6),
            FieldSpec::column(PRODUCT_SIZE, "Product Size", Text, false, 7),
            FieldSpec::column(NOTES, "Notes", Text, false, 8),
            FieldSpec::column(
                SEQUENCE_IDS,
                "Sequence ID",
                SequenceIds {
                    default_logical_db: Some("Sequence DB"),
                },
                false,
                9,
            ),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 10),
            FieldSpec::constant(
                VECTOR_TYPE,
                "Vector Type",
                Identifier(Id::VectorType),
                "Not Applicable",
            ),
            FieldSpec::constant(SEGMENT_TYPE, "Segment Type", Identifier(Id::SegmentType), "primer"),
            FieldSpec::constant(RELATIONSHIP, "Relationship", Text, "A"),
        ],
        key_counters: vec![EntityType::Probe, EntityType::Reference, EntityType::Accession],
        streams: vec![
            Stream::Probe,
            Stream::Marker,
            Stream::Reference,
            Stream::Accession,
            Stream::AccessionReference,
            Stream::Notes,
        ],
        mints_accession: true,
        source_rule: None,
    }
}

fn clone_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::Clone,
        fields: vec![
            FieldSpec::column(NAME, "Clone Name", Text, true, 0),
            FieldSpec::column(MGI_ID, "MGI ID", AccessionId, true, 1),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 2),
            FieldSpec::column(LIBRARY, "Library", Identifier(Id::Library), true, 3),
            FieldSpec::column(REGION_COVERED, "Region Covered", Text, false, 4),
            FieldSpec::column(INSERT_SITE, "Insert Site", Text, false, 5),
            FieldSpec::column(INSERT_SIZE, "Insert Size", Text, false, 6),
            FieldSpec::column(
                SEQUENCE_IDS,
                "Sequence ID",
                SequenceIds {
                    default_logical_db: None,
                },
                false,
                7,
            ),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 8),
            FieldSpec::constant(VECTOR_TYPE, "Vector Type", Identifier(Id::VectorType), "Phagemid"),
            FieldSpec::constant(SEGMENT_TYPE, "Segment Type", Identifier(Id::SegmentType), "cDNA"),
        ],
        key_counters: vec![EntityType::Probe, EntityType::Reference, EntityType::Accession],
        streams: vec![
            Stream::Probe,
            Stream::Reference,
            Stream::Accession,
            Stream::AccessionReference,
        ],
        mints_accession: false,
        source_rule: None,
    }
}

fn probe_marker_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::ProbeMarker,
        fields: vec![
            FieldSpec::column(PROBE, "Probe", Identifier(Id::Probe), true, 0),
            FieldSpec::column(
                MARKERS,
                "Marker",
                IdentifierList {
                    kind: Id::Marker,
                    separator: LIST_SEPARATOR,
                    placeholder: None,
                },
                true,
                1,
            ),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 2),
            FieldSpec::column(RELATIONSHIP, "Relationship", Text, false, 3),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 4),
        ],
        key_counters: Vec::new(),
        streams: vec![Stream::Marker],
        mints_accession: false,
        source_rule: None,
    }
}

fn probe_reference_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::ProbeReference,
        fields: vec![
            FieldSpec::column(PROBE, "Probe", Identifier(Id::Probe), true, 0),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 1),
            FieldSpec::column(ALIASES, "Alias", AliasList, false, 2),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 3),
        ],
        key_counters: vec![EntityType::Reference, EntityType::Alias],
        streams: vec![Stream::Reference, Stream::Alias],
        mints_accession: false,
        source_rule: None,
    }
}

fn probe_notes_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::ProbeNotes,
        fields: vec![
            FieldSpec::column(PROBE, "Probe", Identifier(Id::Probe), true, 0),
            FieldSpec::column(NOTES, "Notes", Text, false, 1),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 2),
        ],
        key_counters: Vec::new(),
        streams: vec![Stream::Notes],
        mints_accession: false,
        source_rule: None,
    }
}

fn probe_extras_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::ProbeExtras,
        fields: vec![
            FieldSpec::column(PROBE, "Probe", Identifier(Id::Probe), true, 0),
            FieldSpec::column(
                MARKERS,
                "Marker",
                IdentifierList {
                    kind: Id::Marker,
                    separator: LIST_SEPARATOR,
                    placeholder: Some("none"),
                },
                false,
                1,
            ),
            FieldSpec::column(REFERENCE, "Reference", Identifier(Id::Reference), true, 2),
            FieldSpec::column(RELATIONSHIP, "Relationship", Text, false, 3),
            FieldSpec::column(ALIASES, "Alias", AliasList, false, 4),
            FieldSpec::column(CREATED_BY, "Creator", Identifier(Id::User), true, 5),
        ],
        key_counters: vec![EntityType::Reference, EntityType::Alias],
        streams: vec![Stream::Marker, Stream::Reference, Stream::Alias],
        mints_accession: false,
        source_rule: None,
    }
}

fn clone_marker_schema() -> LoadSchema {
    use fields::*;
    use FieldKind::*;
    use IdentifierKind as Id;

    LoadSchema {
        load_type: LoadType::CloneMarker,
        fields: vec![
            FieldSpec::column(MARKER, "Marker", Identifier(Id::Marker), true, 0),
            FieldSpec::column(
                CLONES,
                "Clone",
                IdentifierList {
                    kind: Id::Probe,
                    separator: ',',
                    placeholder: None,
                },
                true,
                1,
            ),
            FieldSpec::constant(REFERENCE, "Reference", Identifier(Id::Reference), "J:99680"),
            FieldSpec::constant(RELATIONSHIP, "Relationship", Text, "E"),
            FieldSpec::constant(CREATED_BY, "Creator", Identifier(Id::User), "fantom3"),
        ],
        key_counters: Vec::new(),
        streams: vec![Stream::Marker],
        mints_accession: false,
        source_rule: None,
    }
}
