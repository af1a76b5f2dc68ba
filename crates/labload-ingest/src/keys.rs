//! Surrogate key allocation
//!
//! Counters are seeded once from the backing store (current maximum + 1)
//! before the first record is processed and then advance by one per
//! allocation. Records are only handed to the allocator after validation has
//! accepted them, so rejected lines never consume a key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use labload_common::accession::AccessionNumber;
use labload_common::Key;

use crate::error::{LoadError, Result};

/// Entity types with independently allocated keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Probe,
    Reference,
    Accession,
    Alias,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Probe,
        EntityType::Reference,
        EntityType::Accession,
        EntityType::Alias,
    ];

    /// Name of the entity in the `max_keys.tsv` snapshot
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Probe => "probe",
            EntityType::Reference => "reference",
            EntityType::Accession => "accession",
            EntityType::Alias => "alias",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = LoadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s.trim())
            .ok_or_else(|| LoadError::catalog(format!("unknown entity type '{}'", s)))
    }
}

/// Backing store of current key maxima and accession sequences
pub trait KeySource {
    /// Largest key in use for `entity`, or `None` for an empty table.
    fn max_key(&self, entity: EntityType) -> Result<Option<Key>>;

    /// Largest numeric part issued so far for accession IDs with `prefix`.
    fn max_numeric_part(&self, prefix: &str) -> Result<Option<u64>>;

    /// Advance the accession sequence for `prefix` to `value`.
    fn set_max_numeric_part(&mut self, prefix: &str, value: u64) -> Result<()>;
}

#[derive(Debug, Clone)]
struct AccessionCounter {
    prefix: String,
    initial: u64,
    next: u64,
}

/// Per-run key counters
#[derive(Debug, Clone, Default)]
pub struct KeyAllocator {
    next: BTreeMap<EntityType, Key>,
    issued: BTreeMap<EntityType, Vec<Key>>,
    accession: Option<AccessionCounter>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the counter for `entity` from the backing store; returns the
    /// first key that will be allocated.
    pub fn initialize<K: KeySource + ?Sized>(&mut self, source: &K, entity: EntityType) -> Result<Key> {
        let next = source.max_key(entity)?.unwrap_or(0) + 1;
        debug!(entity = %entity, next, "Initialized key counter");
        self.next.insert(entity, next);
        self.issued.entry(entity).or_default();
        Ok(next)
    }

    /// Seed the accession sequence for `prefix`; returns the first numeric
    /// part that will be minted.
    pub fn initialize_accession<K: KeySource + ?Sized>(
        &mut self,
        source: &K,
        prefix: &str,
    ) -> Result<u64> {
        let initial = source.max_numeric_part(prefix)?.unwrap_or(0);
        debug!(prefix, next = initial + 1, "Initialized accession sequence");
        self.accession = Some(AccessionCounter {
            prefix: prefix.to_string(),
            initial,
            next: initial + 1,
        });
        Ok(initial + 1)
    }

    /// The key the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self, entity: EntityType) -> Option<Key> {
        self.next.get(&entity).copied()
    }

    /// Return the current counter value for `entity` and advance it.
    pub fn allocate(&mut self, entity: EntityType) -> Result<Key> {
        let next = self
            .next
            .get_mut(&entity)
            .ok_or_else(|| LoadError::KeyNotInitialized(entity.to_string()))?;
        let key = *next;
        *next += 1;
        self.issued.entry(entity).or_default().push(key);
        Ok(key)
    }

    /// Mint the next accession ID of the initialized sequence.
    pub fn allocate_accession(&mut self) -> Result<AccessionNumber> {
        let counter = self
            .accession
            .as_mut()
            .ok_or_else(|| LoadError::KeyNotInitialized("accession sequence".to_string()))?;
        let minted = AccessionNumber::minted(counter.prefix.clone(), counter.next);
        counter.next += 1;
        Ok(minted)
    }

    /// Prefix and highest numeric part minted so far (or the seeded maximum
    /// when nothing was minted).
    pub fn accession_max(&self) -> Option<(&str, u64)> {
        self.accession
            .as_ref()
            .map(|c| (c.prefix.as_str(), c.next - 1))
    }

    /// Number of accession IDs minted this run.
    pub fn minted_accessions(&self) -> u64 {
        self.accession.as_ref().map_or(0, |c| c.next - 1 - c.initial)
    }

    /// Keys handed out for `entity`, in allocation order.
    pub fn issued(&self, entity: EntityType) -> &[Key] {
        self.issued.get(&entity).map_or(&[], Vec::as_slice)
    }
}
