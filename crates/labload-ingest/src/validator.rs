//! Record validation
//!
//! Every field of a record is resolved before the accept/reject decision is
//! made, so a rejected line reports all of its problems at once. Field-level
//! problems reject only the record; structural problems (too few columns,
//! unparseable sub-fields) are fatal and returned as errors.

use std::collections::{BTreeMap, HashSet};

use labload_common::accession::{split_accnum, AccessionNumber};
use labload_common::Key;

use crate::error::Result;
use crate::record::{parse_sequence_id, sublist, InputRecord, LIST_SEPARATOR};
use crate::resolver::{IdentifierKind, ReferenceStore, Resolution, Resolver};
use crate::schema::{fields, FieldKind, FieldSpec, LoadSchema};

/// A problem that rejects one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Identifier unknown to the reference data
    Invalid { kind: IdentifierKind, value: String },
    /// Identifier claimed by more than one object in the reference data
    Duplicate { kind: IdentifierKind, value: String },
    /// Required field left empty
    Missing { label: &'static str },
    /// The same object listed twice in one record
    DuplicateAssociation { kind: IdentifierKind, value: String },
    /// A value that does not have the required form
    Malformed { label: &'static str, value: String },
    /// A column that is not valid UTF-8, shown lossily decoded
    Undecodable { label: &'static str, value: String },
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Invalid { kind, value } => write!(f, "Invalid {}: {}", kind, value),
            FieldError::Duplicate { kind, value } => write!(f, "Duplicate {}: {}", kind, value),
            FieldError::Missing { label } => write!(f, "Missing {}", label),
            FieldError::DuplicateAssociation { kind, value } => {
                write!(f, "Duplicate {} association: {}", kind, value)
            },
            FieldError::Malformed { label, value } => write!(f, "Invalid {}: {}", label, value),
            FieldError::Undecodable { label, value } => {
                write!(f, "Invalid {} (not UTF-8): {}", label, value)
            },
        }
    }
}

/// A sequence accession with its logical DB resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceAccession {
    pub logical_db: String,
    pub logical_db_key: Key,
    pub accession: AccessionNumber,
}

/// Value of one field after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Text(String),
    /// `None` for an empty optional identifier
    Key(Option<Key>),
    Keys(Vec<Key>),
    SequenceIds(Vec<SequenceAccession>),
    Aliases(Vec<String>),
    Accession(Option<AccessionNumber>),
}

/// A record that passed validation, ready for emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecord {
    line: u64,
    values: BTreeMap<&'static str, ResolvedValue>,
    raw: Vec<String>,
}

impl ValidRecord {
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Input columns as read
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn get(&self, field: &str) -> Option<&ResolvedValue> {
        self.values.get(field)
    }

    /// Text value of `field`, or `""` when it is absent or not text.
    pub fn text(&self, field: &str) -> &str {
        match self.values.get(field) {
            Some(ResolvedValue::Text(value)) => value,
            _ => "",
        }
    }

    pub fn key(&self, field: &str) -> Option<Key> {
        match self.values.get(field) {
            Some(ResolvedValue::Key(key)) => *key,
            _ => None,
        }
    }

    pub fn keys(&self, field: &str) -> &[Key] {
        match self.values.get(field) {
            Some(ResolvedValue::Keys(keys)) => keys,
            _ => &[],
        }
    }

    pub fn sequence_ids(&self, field: &str) -> &[SequenceAccession] {
        match self.values.get(field) {
            Some(ResolvedValue::SequenceIds(ids)) => ids,
            _ => &[],
        }
    }

    pub fn aliases(&self, field: &str) -> &[String] {
        match self.values.get(field) {
            Some(ResolvedValue::Aliases(aliases)) => aliases,
            _ => &[],
        }
    }

    pub fn accession(&self, field: &str) -> Option<&AccessionNumber> {
        match self.values.get(field) {
            Some(ResolvedValue::Accession(acc)) => acc.as_ref(),
            _ => None,
        }
    }
}

/// Accept/reject decision for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted(ValidRecord),
    Rejected(Vec<FieldError>),
}

/// Validates records of one load type
#[derive(Debug, Clone)]
pub struct Validator {
    schema: LoadSchema,
}

impl Validator {
    pub fn new(schema: LoadSchema) -> Self {
        Self { schema }
    }

    /// Resolve and check every field of `record`.
    pub fn validate<S: ReferenceStore>(
        &self,
        record: &InputRecord,
        resolver: &mut Resolver<S>,
    ) -> Result<Validation> {
        record.check_shape(&self.schema)?;

        let anonymous_source = self
            .schema
            .source_rule
            .as_ref()
            .filter(|rule| record_value(record, &self.schema, rule.library).is_empty());

        let mut values = BTreeMap::new();
        let mut errors = Vec::new();

        for spec in &self.schema.fields {
            let mut required = spec.required;
            if let Some(rule) = &self.schema.source_rule {
                if rule.is_attribute(spec.name) {
                    if anonymous_source.is_none() {
                        // Attributes only describe an anonymous source.
                        continue;
                    }
                    required = true;
                }
            }

            let raw = record.value(spec.source);
            if !record.is_decoded(spec.source) {
                errors.push(FieldError::Undecodable {
                    label: spec.label,
                    value: raw.to_string(),
                });
                continue;
            }
            let value = self.resolve_field(spec, raw, required, record.line(), resolver, &mut errors)?;
            values.insert(spec.name, value);
        }

        if let Some(rule) = &self.schema.source_rule {
            let source = match anonymous_source {
                Some(_) => {
                    let descriptor = rule
                        .attributes
                        .iter()
                        .chain(std::iter::once(&rule.age))
                        .map(|field| record_value(record, &self.schema, field))
                        .collect::<Vec<_>>()
                        .join(";");
                    let resolution = resolver.resolve(IdentifierKind::Source, &descriptor)?;
                    check_resolution(IdentifierKind::Source, &descriptor, resolution, &mut errors)
                },
                None => values.get(rule.library).and_then(|v| match v {
                    ResolvedValue::Key(key) => *key,
                    _ => None,
                }),
            };
            values.insert(fields::SOURCE, ResolvedValue::Key(source));
        }

        if !errors.is_empty() {
            return Ok(Validation::Rejected(errors));
        }

        Ok(Validation::Accepted(ValidRecord {
            line: record.line(),
            values,
            raw: record.fields().to_vec(),
        }))
    }

    /// Resolve one field. Identifiers are trimmed before lookup; free text
    /// and aliases are kept as written.
    fn resolve_field<S: ReferenceStore>(
        &self,
        spec: &FieldSpec,
        raw: &str,
        required: bool,
        line: u64,
        resolver: &mut Resolver<S>,
        errors: &mut Vec<FieldError>,
    ) -> Result<ResolvedValue> {
        match spec.kind {
            FieldKind::Text => {
                if required && raw.trim().is_empty() {
                    errors.push(FieldError::Missing { label: spec.label });
                }
                Ok(ResolvedValue::Text(raw.to_string()))
            },

            FieldKind::Identifier(kind) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    if required {
                        errors.push(FieldError::Missing { label: spec.label });
                    }
                    return Ok(ResolvedValue::Key(None));
                }
                let resolution = resolver.resolve(kind, raw)?;
                Ok(ResolvedValue::Key(check_resolution(kind, raw, resolution, errors)))
            },

            FieldKind::IdentifierList {
                kind,
                separator,
                placeholder,
            } => {
                let entries: Vec<&str> = sublist(raw, separator)
                    .take_while(|entry| Some(*entry) != placeholder)
                    .collect();
                let mut keys = Vec::new();
                let mut seen = HashSet::new();
                let mut reported = HashSet::new();

                for entry in entries.iter().copied() {
                    let resolution = resolver.resolve(kind, entry)?;
                    if let Some(key) = check_resolution(kind, entry, resolution, errors) {
                        if seen.insert(key) {
                            keys.push(key);
                        } else if reported.insert(key) {
                            errors.push(FieldError::DuplicateAssociation {
                                kind,
                                value: entry.to_string(),
                            });
                        }
                    }
                }

                if required && entries.is_empty() {
                    errors.push(FieldError::Missing { label: spec.label });
                }
                Ok(ResolvedValue::Keys(keys))
            },

            FieldKind::SequenceIds { default_logical_db } => {
                let mut ids: Vec<SequenceAccession> = Vec::new();

                for entry in sublist(raw, LIST_SEPARATOR) {
                    let parsed = parse_sequence_id(entry, default_logical_db, line)?;
                    let resolution = resolver.resolve(IdentifierKind::LogicalDb, parsed.logical_db)?;
                    let Some(logical_db_key) =
                        check_resolution(IdentifierKind::LogicalDb, parsed.logical_db, resolution, errors)
                    else {
                        continue;
                    };

                    let already_listed = ids.iter().any(|id| {
                        id.logical_db_key == logical_db_key && id.accession.acc_id() == parsed.acc_id
                    });
                    if !already_listed {
                        ids.push(SequenceAccession {
                            logical_db: parsed.logical_db.to_string(),
                            logical_db_key,
                            accession: split_accnum(parsed.acc_id),
                        });
                    }
                }

                if required && sublist(raw, LIST_SEPARATOR).next().is_none() {
                    errors.push(FieldError::Missing { label: spec.label });
                }
                Ok(ResolvedValue::SequenceIds(ids))
            },

            FieldKind::AliasList => {
                let aliases: Vec<String> = raw
                    .split(LIST_SEPARATOR)
                    .filter(|alias| !alias.trim().is_empty())
                    .map(str::to_string)
                    .collect();
                if required && aliases.is_empty() {
                    errors.push(FieldError::Missing { label: spec.label });
                }
                Ok(ResolvedValue::Aliases(aliases))
            },

            FieldKind::AccessionId => {
                let raw = raw.trim();
                if raw.is_empty() {
                    if required {
                        errors.push(FieldError::Missing { label: spec.label });
                    }
                    return Ok(ResolvedValue::Accession(None));
                }
                let accession = split_accnum(raw);
                if accession.numeric_part().is_none() {
                    errors.push(FieldError::Malformed {
                        label: spec.label,
                        value: raw.to_string(),
                    });
                    return Ok(ResolvedValue::Accession(None));
                }
                Ok(ResolvedValue::Accession(Some(accession)))
            },
        }
    }
}

/// Raw, trimmed value of the schema field `name`.
fn record_value<'a>(record: &'a InputRecord, schema: &LoadSchema, name: &str) -> &'a str {
    schema
        .field(name)
        .map_or("", |spec| record.value(spec.source).trim())
}

fn check_resolution(
    kind: IdentifierKind,
    value: &str,
    resolution: Resolution,
    errors: &mut Vec<FieldError>,
) -> Option<Key> {
    match resolution {
        Resolution::Found(key) => Some(key),
        Resolution::NotFound => {
            errors.push(FieldError::Invalid {
                kind,
                value: value.to_string(),
            });
            None
        },
        Resolution::Duplicate(_) => {
            errors.push(FieldError::Duplicate {
                kind,
                value: value.to_string(),
            });
            None
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::IdentifierCatalog;
    use crate::error::LoadError;
    use crate::schema::LoadType;

    fn catalog() -> IdentifierCatalog {
        IdentifierCatalog::new()
            .with_identifier(IdentifierKind::User, "jdoe", 1001)
            .with_identifier(IdentifierKind::User, "fantom3", 1002)
            .with_identifier(IdentifierKind::Reference, "J:99680", 5002)
            .with_identifier(IdentifierKind::Probe, "MGI:101", 43)
            .with_identifier(IdentifierKind::Reference, "J:99999", 5000)
            .with_identifier(IdentifierKind::Library, "Lib1", 300)
            .with_identifier(IdentifierKind::VectorType, "Phagemid", 11)
            .with_identifier(IdentifierKind::SegmentType, "cDNA", 12)
            .with_identifier(IdentifierKind::LogicalDb, "GenBank", 9)
            .with_identifier(IdentifierKind::Probe, "MGI:100", 42)
            .with_identifier(IdentifierKind::Marker, "MGI:1", 71)
            .with_identifier(IdentifierKind::Marker, "MGI:2", 72)
            .with_identifier(IdentifierKind::Marker, "MGI:3", 73)
            .with_identifier(IdentifierKind::Marker, "MGI:3", 74)
            .with_identifier(IdentifierKind::Organism, "mouse", 1)
            .with_identifier(IdentifierKind::Strain, "C57BL/6J", 2)
            .with_identifier(IdentifierKind::Tissue, "brain", 3)
            .with_identifier(IdentifierKind::Gender, "Female", 4)
            .with_identifier(IdentifierKind::CellLine, "Not Specified", 5)
            .with_identifier(IdentifierKind::Source, "mouse;C57BL/6J;brain;Female;Not Specified;adult", 600)
    }

    fn validate(load_type: LoadType, line: &str) -> Result<Validation> {
        let validator = Validator::new(LoadSchema::for_load_type(load_type));
        let mut resolver = Resolver::new(catalog());
        validator.validate(&InputRecord::from_line(1, line), &mut resolver)
    }

    fn accepted(validation: Validation) -> ValidRecord {
        match validation {
            Validation::Accepted(record) => record,
            Validation::Rejected(errors) => panic!("unexpected rejection: {:?}", errors),
        }
    }

    fn rejected(validation: Validation) -> Vec<String> {
        match validation {
            Validation::Accepted(record) => panic!("unexpected acceptance: {:?}", record),
            Validation::Rejected(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_clone_record_resolves() {
        let record = accepted(
            validate(
                LoadType::Clone,
                "ProbeX\tMGI:001\tJ:99999\tLib1\tbrain\tsite\t500\tGenBank:AB123|\tjdoe",
            )
            .unwrap(),
        );

        assert_eq!(record.text(fields::NAME), "ProbeX");
        assert_eq!(record.key(fields::REFERENCE), Some(5000));
        assert_eq!(record.key(fields::LIBRARY), Some(300));
        assert_eq!(record.key(fields::CREATED_BY), Some(1001));
        assert_eq!(record.accession(fields::MGI_ID).unwrap().acc_id(), "MGI:001");

        let ids = record.sequence_ids(fields::SEQUENCE_IDS);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].logical_db_key, 9);
        assert_eq!(ids[0].accession.acc_id(), "AB123");
    }

    #[test]
    fn test_every_invalid_field_is_reported() {
        let errors = rejected(
            validate(
                LoadType::Clone,
                "ProbeX\tMGI:001\tJ:1\tLib1\tbrain\tsite\t500\t\tnobody",
            )
            .unwrap(),
        );
        assert_eq!(errors, vec!["Invalid Reference: J:1", "Invalid User: nobody"]);
    }

    #[test]
    fn test_missing_required_field() {
        let errors = rejected(
            validate(LoadType::ProbeNotes, "MGI:100\tsome note\t").unwrap(),
        );
        assert_eq!(errors, vec!["Missing Creator"]);
    }

    #[test]
    fn test_duplicate_association_rejects_record() {
        let errors = rejected(
            validate(LoadType::ProbeMarker, "MGI:100\tMGI:1|MGI:2|MGI:1|MGI:1\tJ:99999\tE\tjdoe").unwrap(),
        );
        assert_eq!(errors, vec!["Duplicate Marker association: MGI:1"]);
    }

    #[test]
    fn test_conflicting_reference_data_is_duplicate() {
        let errors = rejected(
            validate(LoadType::ProbeMarker, "MGI:100\tMGI:3\tJ:99999\tE\tjdoe").unwrap(),
        );
        assert_eq!(errors, vec!["Duplicate Marker: MGI:3"]);
    }

    #[test]
    fn test_repeated_sequence_id_is_listed_once() {
        let record = accepted(
            validate(
                LoadType::Clone,
                "ProbeX\tMGI:001\tJ:99999\tLib1\t\t\t\tGenBank:AB123|GenBank:AB123\tjdoe",
            )
            .unwrap(),
        );
        assert_eq!(record.sequence_ids(fields::SEQUENCE_IDS).len(), 1);
    }

    #[test]
    fn test_sequence_id_without_logical_db_is_fatal() {
        let err = validate(
            LoadType::Clone,
            "ProbeX\tMGI:001\tJ:99999\tLib1\t\t\t\tAB123\tjdoe",
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::MalformedSubField { line: 1, .. }));
    }

    #[test]
    fn test_short_line_is_fatal() {
        let err = validate(LoadType::Clone, "ProbeX\tMGI:001\tJ:99999").unwrap_err();
        assert!(matches!(err, LoadError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn test_supplied_accession_needs_numeric_part() {
        let errors = rejected(
            validate(LoadType::Clone, "ProbeX\tMGI:\tJ:99999\tLib1\t\t\t\t\tjdoe").unwrap(),
        );
        assert_eq!(errors, vec!["Invalid MGI ID: MGI:"]);
    }

    #[test]
    fn test_probe_with_library_ignores_source_attributes() {
        let line = [
            "p1", "J:99999", "Lib1", "martian", "", "", "", "", "", "Phagemid", "cDNA", "", "", "",
            "MGI:1", "E", "", "", "jdoe",
        ]
        .join("\t");

        let record = accepted(validate(LoadType::Probe, &line).unwrap());
        assert_eq!(record.key(fields::SOURCE), Some(300));
        assert!(record.get(fields::ORGANISM).is_none());
    }

    #[test]
    fn test_probe_without_library_resolves_anonymous_source() {
        let line = [
            "p1", "J:99999", "", "mouse", "C57BL/6J", "brain", "Female", "Not Specified", "adult",
            "Phagemid", "cDNA", "", "", "", "MGI:1", "E", "", "", "jdoe",
        ]
        .join("\t");

        let record = accepted(validate(LoadType::Probe, &line).unwrap());
        assert_eq!(record.key(fields::SOURCE), Some(600));
        assert_eq!(record.key(fields::ORGANISM), Some(1));
    }

    #[test]
    fn test_probe_without_library_requires_attributes() {
        let line = [
            "p1", "J:99999", "", "mouse", "", "brain", "Female", "Not Specified", "adult",
            "Phagemid", "cDNA", "", "", "", "MGI:1", "E", "", "", "jdoe",
        ]
        .join("\t");

        let errors = rejected(validate(LoadType::Probe, &line).unwrap());
        assert_eq!(
            errors,
            vec![
                "Missing Strain",
                "Invalid Source: mouse;;brain;Female;Not Specified;adult"
            ]
        );
    }

    #[test]
    fn test_primer_constants_resolve() {
        let catalog = catalog()
            .with_identifier(IdentifierKind::VectorType, "Not Applicable", 21)
            .with_identifier(IdentifierKind::SegmentType, "primer", 22)
            .with_identifier(IdentifierKind::LogicalDb, "Sequence DB", 23);
        let validator = Validator::new(LoadSchema::for_load_type(LoadType::Primer));
        let mut resolver = Resolver::new(catalog);

        let line = "Pax6\tMGI:1\tpr1\tJ:99999\t\tACGT\tTGCA\t200\t\tX123|X124\tjdoe";
        let record = accepted(
            validator
                .validate(&InputRecord::from_line(1, line), &mut resolver)
                .unwrap(),
        );

        assert_eq!(record.key(fields::VECTOR_TYPE), Some(21));
        assert_eq!(record.key(fields::SEGMENT_TYPE), Some(22));
        assert_eq!(record.text(fields::RELATIONSHIP), "A");
        let ids = record.sequence_ids(fields::SEQUENCE_IDS);
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.logical_db_key == 23));
    }

    #[test]
    fn test_free_text_is_kept_verbatim() {
        let record = accepted(validate(LoadType::ProbeNotes, " MGI:100 \t  two  spaces \t jdoe").unwrap());
        assert_eq!(record.key(fields::PROBE), Some(42));
        assert_eq!(record.key(fields::CREATED_BY), Some(1001));
        assert_eq!(record.text(fields::NOTES), "  two  spaces ");

        let record = accepted(validate(LoadType::ProbeReference, "MGI:100\tJ:99999\t pA |pB| |\tjdoe").unwrap());
        assert_eq!(record.aliases(fields::ALIASES), [" pA ", "pB"]);
    }

    #[test]
    fn test_blank_required_text_is_missing() {
        let line = "Pax6\tMGI:1\t  \tJ:99999\t\t\t\t\t\t\tjdoe";
        let errors = rejected(validate(LoadType::Primer, line).unwrap());
        assert!(errors.contains(&"Missing Primer Name".to_string()));
    }

    #[test]
    fn test_non_utf8_field_rejects_only_the_record() {
        let validator = Validator::new(LoadSchema::for_load_type(LoadType::ProbeNotes));
        let mut resolver = Resolver::new(catalog());

        let record = InputRecord::from_bytes(2, b"MGI:100\tcaf\xE9\tjdoe");
        let errors = rejected(validator.validate(&record, &mut resolver).unwrap());
        assert_eq!(errors, vec!["Invalid Notes (not UTF-8): caf\u{FFFD}"]);
    }

    #[test]
    fn test_marker_placeholder_ends_the_list() {
        let record = accepted(validate(LoadType::ProbeExtras, "MGI:100\tnone\tJ:99999\t\t\tjdoe").unwrap());
        assert!(record.keys(fields::MARKERS).is_empty());

        let record = accepted(
            validate(LoadType::ProbeExtras, "MGI:100\tMGI:1|none|MGI:9\tJ:99999\tE\tpA\tjdoe").unwrap(),
        );
        assert_eq!(record.keys(fields::MARKERS), [71]);
        assert_eq!(record.aliases(fields::ALIASES), ["pA"]);
    }

    #[test]
    fn test_probe_extras_requires_reference() {
        let errors = rejected(validate(LoadType::ProbeExtras, "MGI:100\tMGI:1\t\tE\t\tjdoe").unwrap());
        assert_eq!(errors, vec!["Missing Reference"]);
    }

    #[test]
    fn test_clone_marker_splits_clones_on_commas() {
        let record = accepted(validate(LoadType::CloneMarker, "MGI:1\tMGI:100, MGI:101").unwrap());
        assert_eq!(record.key(fields::MARKER), Some(71));
        assert_eq!(record.keys(fields::CLONES), [42, 43]);
        assert_eq!(record.key(fields::REFERENCE), Some(5002));
        assert_eq!(record.key(fields::CREATED_BY), Some(1002));

        let errors = rejected(validate(LoadType::CloneMarker, "MGI:1\tMGI:100,MGI:555").unwrap());
        assert_eq!(errors, vec!["Invalid Probe: MGI:555"]);
    }
}
