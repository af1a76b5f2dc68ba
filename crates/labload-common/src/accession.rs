//! Accession number utilities
//!
//! An accession ID such as `MGI:12345` is stored as a prefix part (`MGI:`)
//! and a numeric part (`12345`). The numeric part is the maximal run of
//! trailing ASCII digits; everything before it is the prefix.

use serde::{Deserialize, Serialize};

/// Prefix of accession IDs minted by the loaders.
pub const MGI_PREFIX: &str = "MGI:";

/// An accession ID split into its prefix and numeric parts.
///
/// The digit text is kept verbatim so that zero-padded IDs (`MGI:001`)
/// join back to exactly the string they were split from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessionNumber {
    prefix: String,
    digits: String,
}

impl AccessionNumber {
    /// Build a freshly minted accession ID, e.g. `MGI:` + 5001.
    pub fn minted(prefix: impl Into<String>, numeric: u64) -> Self {
        Self {
            prefix: prefix.into(),
            digits: numeric.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Numeric part, or `None` when the ID has no trailing digits.
    pub fn numeric_part(&self) -> Option<u64> {
        if self.digits.is_empty() {
            None
        } else {
            self.digits.parse().ok()
        }
    }

    /// The full accession ID.
    pub fn acc_id(&self) -> String {
        format!("{}{}", self.prefix, self.digits)
    }
}

impl std::fmt::Display for AccessionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.digits)
    }
}

/// Split an accession ID into prefix and numeric parts.
///
/// IDs without trailing digits, or whose digits do not fit in a `u64`, keep
/// the whole string as prefix and have no numeric part.
pub fn split_accnum(acc_id: &str) -> AccessionNumber {
    let split_at = acc_id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(acc_id.len());

    let (prefix, digits) = acc_id.split_at(split_at);
    if digits.is_empty() || digits.parse::<u64>().is_err() {
        return AccessionNumber {
            prefix: acc_id.to_string(),
            digits: String::new(),
        };
    }

    AccessionNumber {
        prefix: prefix.to_string(),
        digits: digits.to_string(),
    }
}
