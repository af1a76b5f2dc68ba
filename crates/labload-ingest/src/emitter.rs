//! Multi-stream emission
//!
//! For an accepted record, allocates the record's keys and writes its rows to
//! every output stream of the load type. All keys a record needs are taken
//! from the allocator inside one [`Emitter::emit`] call, so secondary rows
//! can only refer to a primary key allocated for the same record.

use labload_common::accession::{AccessionNumber, MGI_PREFIX};
use labload_common::types::{LoadDate, NOT_APPLICABLE};
use labload_common::Key;

use crate::error::{LoadError, Result};
use crate::keys::{EntityType, KeyAllocator};
use crate::schema::{fields, LoadSchema, LoadType};
use crate::streams::{OutputStreams, Stream};
use crate::validator::{SequenceAccession, ValidRecord};

/// Logical DB of accession IDs issued by this database
pub const MGI_LOGICAL_DB: Key = 1;

/// Object type of probes in the accession table
pub const PROBE_MGI_TYPE: Key = 3;

/// Longest note chunk a notes row can hold
pub const NOTE_CHUNK_LEN: usize = 255;

/// Keys and IDs issued for one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emitted {
    /// Key of the record's primary row, for load types that create one
    pub primary_key: Option<Key>,
    /// Accession ID minted for the record
    pub minted: Option<AccessionNumber>,
    /// Every key allocated, in allocation order
    pub allocated: Vec<(EntityType, Key)>,
}

impl Emitted {
    fn allocate(&mut self, keys: &mut KeyAllocator, entity: EntityType) -> Result<Key> {
        let key = keys.allocate(entity)?;
        self.allocated.push((entity, key));
        Ok(key)
    }

    /// One-line description for the diagnostics file
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .allocated
            .iter()
            .map(|(entity, key)| format!("{}={}", entity, key))
            .collect();
        if let Some(minted) = &self.minted {
            parts.push(minted.acc_id());
        }
        if parts.is_empty() {
            "no keys allocated".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Audit columns shared by most rows
struct Audit {
    created_by: String,
    date: String,
}

impl Audit {
    /// created_by, modified_by, creation_date, modification_date
    fn full(&self) -> [&str; 4] {
        [&self.created_by, &self.created_by, &self.date, &self.date]
    }

    /// creation_date, modification_date
    fn dates(&self) -> [&str; 2] {
        [&self.date, &self.date]
    }
}

/// Writes accepted records of one load type
#[derive(Debug, Clone)]
pub struct Emitter {
    load_type: LoadType,
    load_date: String,
}

impl Emitter {
    pub fn new(schema: &LoadSchema, load_date: LoadDate) -> Self {
        Self {
            load_type: schema.load_type,
            load_date: load_date.to_string(),
        }
    }

    /// Allocate keys for `record` and write all of its rows.
    pub fn emit(
        &self,
        record: &ValidRecord,
        keys: &mut KeyAllocator,
        out: &mut OutputStreams,
    ) -> Result<Emitted> {
        let audit = Audit {
            created_by: key_text(record.key(fields::CREATED_BY)),
            date: self.load_date.clone(),
        };

        match self.load_type {
            LoadType::Probe | LoadType::Primer => self.emit_new_probe(record, &audit, keys, out),
            LoadType::Clone => emit_clone(record, &audit, keys, out),
            LoadType::ProbeMarker => emit_probe_markers(record, &audit, out),
            LoadType::ProbeReference => emit_probe_reference(record, &audit, keys, out),
            LoadType::ProbeNotes => emit_probe_notes(record, &audit, out),
            LoadType::ProbeExtras => emit_probe_extras(record, &audit, keys, out),
            LoadType::CloneMarker => emit_clone_markers(record, &audit, out),
        }
    }

    fn emit_new_probe(
        &self,
        record: &ValidRecord,
        audit: &Audit,
        keys: &mut KeyAllocator,
        out: &mut OutputStreams,
    ) -> Result<Emitted> {
        let mut emitted = Emitted::default();
        let probe_key = emitted.allocate(keys, EntityType::Probe)?;
        let ref_key = emitted.allocate(keys, EntityType::Reference)?;
        let minted = keys.allocate_accession()?;
        let acc_key = emitted.allocate(keys, EntityType::Accession)?;
        emitted.primary_key = Some(probe_key);

        let probe = probe_key.to_string();
        let reference = key_text(record.key(fields::REFERENCE));

        let row = match self.load_type {
            LoadType::Primer => probe_row(
                &probe,
                record.text(fields::NAME),
                &NOT_APPLICABLE.to_string(),
                record,
                [
                    record.text(fields::SEQUENCE_1),
                    record.text(fields::SEQUENCE_2),
                    record.text(fields::REGION_COVERED),
                    "",
                    "",
                    record.text(fields::PRODUCT_SIZE),
                ],
            ),
            _ => probe_row(
                &probe,
                record.text(fields::NAME),
                &key_text(record.key(fields::SOURCE)),
                record,
                [
                    "",
                    "",
                    record.text(fields::REGION_COVERED),
                    record.text(fields::INSERT_SITE),
                    record.text(fields::INSERT_SIZE),
                    "",
                ],
            ),
        };
        out.write_row(Stream::Probe, with_audit(row, audit))?;

        write_marker(out, &probe, &key_text(record.key(fields::MARKER)), record, audit)?;

        write_reference(out, ref_key, &probe, &reference, audit)?;
        write_accession(out, acc_key, &minted, MGI_LOGICAL_DB, &probe, audit)?;

        if out.is_open(Stream::NewProbeReport) {
            let mut report: Vec<String> = record.raw().to_vec();
            report.push(minted.acc_id());
            out.write_row(Stream::NewProbeReport, report)?;
        }

        write_notes(out, &probe, record.text(fields::NOTES), audit)?;
        write_sequence_ids(
            out,
            &mut emitted,
            keys,
            record.sequence_ids(fields::SEQUENCE_IDS),
            &probe,
            &reference,
            audit,
        )?;

        emitted.minted = Some(minted);
        Ok(emitted)
    }
}

fn emit_clone(
    record: &ValidRecord,
    audit: &Audit,
    keys: &mut KeyAllocator,
    out: &mut OutputStreams,
) -> Result<Emitted> {
    let accession = record
        .accession(fields::MGI_ID)
        .ok_or_else(|| LoadError::MalformedSubField {
            line: record.line(),
            field: "MGI ID".to_string(),
            value: String::new(),
        })?;

    let mut emitted = Emitted::default();
    let probe_key = emitted.allocate(keys, EntityType::Probe)?;
    let ref_key = emitted.allocate(keys, EntityType::Reference)?;
    let acc_key = emitted.allocate(keys, EntityType::Accession)?;
    emitted.primary_key = Some(probe_key);

    let probe = probe_key.to_string();
    let reference = key_text(record.key(fields::REFERENCE));

    let row = probe_row(
        &probe,
        record.text(fields::NAME),
        &key_text(record.key(fields::LIBRARY)),
        record,
        [
            "",
            "",
            record.text(fields::REGION_COVERED),
            record.text(fields::INSERT_SITE),
            record.text(fields::INSERT_SIZE),
            "",
        ],
    );
    out.write_row(Stream::Probe, with_audit(row, audit))?;
    write_reference(out, ref_key, &probe, &reference, audit)?;
    write_accession(out, acc_key, accession, MGI_LOGICAL_DB, &probe, audit)?;
    write_sequence_ids(
        out,
        &mut emitted,
        keys,
        record.sequence_ids(fields::SEQUENCE_IDS),
        &probe,
        &reference,
        audit,
    )?;

    Ok(emitted)
}

fn emit_probe_markers(record: &ValidRecord, audit: &Audit, out: &mut OutputStreams) -> Result<Emitted> {
    let probe = key_text(record.key(fields::PROBE));
    for marker in record.keys(fields::MARKERS) {
        write_marker(out, &probe, &marker.to_string(), record, audit)?;
    }
    Ok(Emitted::default())
}

fn emit_probe_reference(
    record: &ValidRecord,
    audit: &Audit,
    keys: &mut KeyAllocator,
    out: &mut OutputStreams,
) -> Result<Emitted> {
    let mut emitted = Emitted::default();
    let ref_key = emitted.allocate(keys, EntityType::Reference)?;

    let probe = key_text(record.key(fields::PROBE));
    let reference = key_text(record.key(fields::REFERENCE));
    write_reference(out, ref_key, &probe, &reference, audit)?;
    write_aliases(out, &mut emitted, keys, ref_key, record.aliases(fields::ALIASES), audit)?;
    Ok(emitted)
}

/// The reference row is always written; marker and alias rows only when
/// the record lists some.
fn emit_probe_extras(
    record: &ValidRecord,
    audit: &Audit,
    keys: &mut KeyAllocator,
    out: &mut OutputStreams,
) -> Result<Emitted> {
    let mut emitted = Emitted::default();
    let probe = key_text(record.key(fields::PROBE));

    for marker in record.keys(fields::MARKERS) {
        write_marker(out, &probe, &marker.to_string(), record, audit)?;
    }

    let ref_key = emitted.allocate(keys, EntityType::Reference)?;
    let reference = key_text(record.key(fields::REFERENCE));
    write_reference(out, ref_key, &probe, &reference, audit)?;
    write_aliases(out, &mut emitted, keys, ref_key, record.aliases(fields::ALIASES), audit)?;
    Ok(emitted)
}

fn emit_clone_markers(record: &ValidRecord, audit: &Audit, out: &mut OutputStreams) -> Result<Emitted> {
    let marker = key_text(record.key(fields::MARKER));
    for clone in record.keys(fields::CLONES) {
        write_marker(out, &clone.to_string(), &marker, record, audit)?;
    }
    Ok(Emitted::default())
}

fn emit_probe_notes(record: &ValidRecord, audit: &Audit, out: &mut OutputStreams) -> Result<Emitted> {
    let probe = key_text(record.key(fields::PROBE));
    write_notes(out, &probe, record.text(fields::NOTES), audit)?;
    Ok(Emitted::default())
}

/// Probe columns up to (not including) the audit columns. `detail` is
/// primer sequence 1, primer sequence 2, region covered, insert site,
/// insert size, product size.
fn probe_row(
    probe: &str,
    name: &str,
    source: &str,
    record: &ValidRecord,
    detail: [&str; 6],
) -> Vec<String> {
    let mut row = vec![
        probe.to_string(),
        name.to_string(),
        String::new(),
        source.to_string(),
        key_text(record.key(fields::VECTOR_TYPE)),
        key_text(record.key(fields::SEGMENT_TYPE)),
    ];
    row.extend(detail.iter().map(|d| d.to_string()));
    row
}

fn with_audit(mut row: Vec<String>, audit: &Audit) -> Vec<String> {
    row.extend(audit.full().iter().map(|a| a.to_string()));
    row
}

/// Probe/marker row: probe, marker, reference, relationship, audit.
fn write_marker(
    out: &mut OutputStreams,
    probe: &str,
    marker: &str,
    record: &ValidRecord,
    audit: &Audit,
) -> Result<()> {
    out.write_row(
        Stream::Marker,
        with_audit(
            vec![
                probe.to_string(),
                marker.to_string(),
                key_text(record.key(fields::REFERENCE)),
                record.text(fields::RELATIONSHIP).to_string(),
            ],
            audit,
        ),
    )
}

fn write_aliases(
    out: &mut OutputStreams,
    emitted: &mut Emitted,
    keys: &mut KeyAllocator,
    ref_key: Key,
    aliases: &[String],
    audit: &Audit,
) -> Result<()> {
    for alias in aliases {
        let alias_key = emitted.allocate(keys, EntityType::Alias)?;
        out.write_row(
            Stream::Alias,
            with_audit(
                vec![alias_key.to_string(), ref_key.to_string(), alias.clone()],
                audit,
            ),
        )?;
    }
    Ok(())
}

fn write_reference(
    out: &mut OutputStreams,
    ref_key: Key,
    probe: &str,
    reference: &str,
    audit: &Audit,
) -> Result<()> {
    out.write_row(
        Stream::Reference,
        with_audit(
            vec![
                ref_key.to_string(),
                probe.to_string(),
                reference.to_string(),
                "0".to_string(),
                "0".to_string(),
            ],
            audit,
        ),
    )
}

fn write_accession(
    out: &mut OutputStreams,
    acc_key: Key,
    accession: &AccessionNumber,
    logical_db: Key,
    object: &str,
    audit: &Audit,
) -> Result<()> {
    let numeric = accession
        .numeric_part()
        .map(|n| n.to_string())
        .unwrap_or_default();
    out.write_row(
        Stream::Accession,
        with_audit(
            vec![
                acc_key.to_string(),
                accession.acc_id(),
                accession.prefix().to_string(),
                numeric,
                logical_db.to_string(),
                object.to_string(),
                PROBE_MGI_TYPE.to_string(),
                "0".to_string(),
                "1".to_string(),
            ],
            audit,
        ),
    )
}

fn write_sequence_ids(
    out: &mut OutputStreams,
    emitted: &mut Emitted,
    keys: &mut KeyAllocator,
    ids: &[SequenceAccession],
    probe: &str,
    reference: &str,
    audit: &Audit,
) -> Result<()> {
    for id in ids {
        let acc_key = emitted.allocate(keys, EntityType::Accession)?;
        write_accession(out, acc_key, &id.accession, id.logical_db_key, probe, audit)?;
        out.write_row(
            Stream::AccessionReference,
            with_audit(vec![acc_key.to_string(), reference.to_string()], audit),
        )?;
    }
    Ok(())
}

/// Notes rows: probe key, sequence number, chunk, creation and modification
/// date.
fn write_notes(out: &mut OutputStreams, probe: &str, notes: &str, audit: &Audit) -> Result<()> {
    for (seq, chunk) in note_chunks(notes).iter().enumerate() {
        let mut row = vec![probe.to_string(), (seq + 1).to_string(), chunk.clone()];
        row.extend(audit.dates().iter().map(|d| d.to_string()));
        out.write_row(Stream::Notes, row)?;
    }
    Ok(())
}

/// Split a note into consecutive chunks of at most [`NOTE_CHUNK_LEN`]
/// characters.
pub fn note_chunks(notes: &str) -> Vec<String> {
    let chars: Vec<char> = notes.chars().collect();
    chars
        .chunks(NOTE_CHUNK_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn key_text(key: Option<Key>) -> String {
    key.map(|k| k.to_string()).unwrap_or_default()
}

/// `MGI:` accession IDs are minted by probe and primer loads only.
pub fn minting_prefix(schema: &LoadSchema) -> Option<&'static str> {
    schema.mints_accession.then_some(MGI_PREFIX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{IdentifierCatalog, KeyCatalog};
    use crate::record::InputRecord;
    use crate::resolver::{IdentifierKind, Resolver};
    use crate::validator::{Validation, Validator};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn load_date() -> LoadDate {
        LoadDate::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn catalog() -> IdentifierCatalog {
        IdentifierCatalog::new()
            .with_identifier(IdentifierKind::User, "jdoe", 1001)
            .with_identifier(IdentifierKind::Reference, "J:99999", 5000)
            .with_identifier(IdentifierKind::Library, "Lib1", 300)
            .with_identifier(IdentifierKind::VectorType, "Phagemid", 11)
            .with_identifier(IdentifierKind::SegmentType, "cDNA", 12)
            .with_identifier(IdentifierKind::LogicalDb, "GenBank", 9)
            .with_identifier(IdentifierKind::Probe, "MGI:100", 42)
            .with_identifier(IdentifierKind::Marker, "MGI:1", 71)
            .with_identifier(IdentifierKind::Marker, "MGI:2", 72)
            .with_identifier(IdentifierKind::Probe, "MGI:101", 43)
            .with_identifier(IdentifierKind::Reference, "J:99680", 5002)
            .with_identifier(IdentifierKind::User, "fantom3", 1002)
    }

    fn keys() -> KeyAllocator {
        let source = KeyCatalog::new()
            .with_max_key(EntityType::Probe, 1000)
            .with_max_key(EntityType::Reference, 50)
            .with_max_key(EntityType::Accession, 2000)
            .with_max_key(EntityType::Alias, 7)
            .with_accession_max(MGI_PREFIX, 5000);
        let mut keys = KeyAllocator::new();
        for entity in EntityType::ALL {
            keys.initialize(&source, entity).unwrap();
        }
        keys.initialize_accession(&source, MGI_PREFIX).unwrap();
        keys
    }

    /// Validate and emit one line, returning the output file contents.
    fn emit_line(load_type: LoadType, line: &str) -> (Emitted, TempDir) {
        let schema = LoadSchema::for_load_type(load_type);
        let validator = Validator::new(schema.clone());
        let mut resolver = Resolver::new(catalog());
        let record = match validator
            .validate(&InputRecord::from_line(1, line), &mut resolver)
            .unwrap()
        {
            Validation::Accepted(record) => record,
            Validation::Rejected(errors) => panic!("rejected: {:?}", errors),
        };

        let dir = TempDir::new().unwrap();
        let mut out = OutputStreams::create(dir.path(), &schema.streams, b'|').unwrap();
        let emitted = Emitter::new(&schema, load_date())
            .emit(&record, &mut keys(), &mut out)
            .unwrap();
        out.finish().unwrap();
        (emitted, dir)
    }

    fn read(dir: &TempDir, stream: Stream) -> String {
        std::fs::read_to_string(dir.path().join(stream.file_name())).unwrap()
    }

    #[test]
    fn test_clone_rows() {
        let (emitted, dir) = emit_line(
            LoadType::Clone,
            "ProbeX\tMGI:001\tJ:99999\tLib1\tbrain\tsite\t500\tGenBank:AB123|\tjdoe",
        );

        assert_eq!(emitted.primary_key, Some(1001));
        assert_eq!(
            read(&dir, Stream::Probe),
            "1001|ProbeX||300|11|12|||brain|site|500||1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(
            read(&dir, Stream::Reference),
            "51|1001|5000|0|0|1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(
            read(&dir, Stream::Accession),
            "2001|MGI:001|MGI:|1|1|1001|3|0|1|1001|1001|03/01/2024|03/01/2024\n\
             2002|AB123|AB|123|9|1001|3|0|1|1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(
            read(&dir, Stream::AccessionReference),
            "2002|5000|1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(emitted.describe(), "probe=1001 reference=51 accession=2001 accession=2002");
    }

    #[test]
    fn test_probe_marker_rows() {
        let (emitted, dir) = emit_line(LoadType::ProbeMarker, "MGI:100\tMGI:1|MGI:2|\tJ:99999\tE\tjdoe");

        assert!(emitted.allocated.is_empty());
        assert_eq!(
            read(&dir, Stream::Marker),
            "42|71|5000|E|1001|1001|03/01/2024|03/01/2024\n\
             42|72|5000|E|1001|1001|03/01/2024|03/01/2024\n"
        );
    }

    #[test]
    fn test_probe_reference_rows() {
        let (emitted, dir) = emit_line(LoadType::ProbeReference, "MGI:100\tJ:99999\tpA|pB\tjdoe");

        assert_eq!(
            emitted.allocated,
            vec![
                (EntityType::Reference, 51),
                (EntityType::Alias, 8),
                (EntityType::Alias, 9)
            ]
        );
        assert_eq!(
            read(&dir, Stream::Alias),
            "8|51|pA|1001|1001|03/01/2024|03/01/2024\n9|51|pB|1001|1001|03/01/2024|03/01/2024\n"
        );
    }

    #[test]
    fn test_long_notes_are_chunked() {
        let note = "x".repeat(NOTE_CHUNK_LEN + 10);
        let (_, dir) = emit_line(LoadType::ProbeNotes, &format!("MGI:100\t{}\tjdoe", note));

        let content = read(&dir, Stream::Notes);
        let rows: Vec<&str> = content.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("42|1|xxx"));
        assert_eq!(rows[1], "42|2|xxxxxxxxxx|03/01/2024|03/01/2024");
    }

    #[test]
    fn test_empty_notes_write_nothing() {
        let (_, dir) = emit_line(LoadType::ProbeNotes, "MGI:100\t\tjdoe");
        assert_eq!(read(&dir, Stream::Notes), "");
    }

    #[test]
    fn test_note_chunks_respect_characters() {
        let note = "é".repeat(NOTE_CHUNK_LEN + 1);
        let chunks = note_chunks(&note);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), NOTE_CHUNK_LEN);
        assert_eq!(chunks[1], "é");
        assert!(note_chunks("").is_empty());
    }

    #[test]
    fn test_probe_extras_rows() {
        let (emitted, dir) = emit_line(LoadType::ProbeExtras, "MGI:100\tMGI:1|MGI:2\tJ:99999\tE\tpA\tjdoe");

        assert_eq!(
            emitted.allocated,
            vec![(EntityType::Reference, 51), (EntityType::Alias, 8)]
        );
        assert_eq!(
            read(&dir, Stream::Marker),
            "42|71|5000|E|1001|1001|03/01/2024|03/01/2024\n\
             42|72|5000|E|1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(
            read(&dir, Stream::Reference),
            "51|42|5000|0|0|1001|1001|03/01/2024|03/01/2024\n"
        );
        assert_eq!(read(&dir, Stream::Alias), "8|51|pA|1001|1001|03/01/2024|03/01/2024\n");
    }

    #[test]
    fn test_probe_extras_without_marker_or_alias() {
        let (emitted, dir) = emit_line(LoadType::ProbeExtras, "MGI:100\tnone\tJ:99999\t\t\tjdoe");

        assert_eq!(emitted.allocated, vec![(EntityType::Reference, 51)]);
        assert_eq!(read(&dir, Stream::Marker), "");
        assert_eq!(read(&dir, Stream::Alias), "");
        assert_eq!(read(&dir, Stream::Reference).lines().count(), 1);
    }

    #[test]
    fn test_clone_marker_rows() {
        let (emitted, dir) = emit_line(LoadType::CloneMarker, "MGI:2\tMGI:100,MGI:101");

        assert!(emitted.allocated.is_empty());
        assert_eq!(
            read(&dir, Stream::Marker),
            "42|72|5002|E|1002|1002|03/01/2024|03/01/2024\n\
             43|72|5002|E|1002|1002|03/01/2024|03/01/2024\n"
        );
    }
}
