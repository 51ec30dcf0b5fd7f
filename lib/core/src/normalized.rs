use crate::record::{Coordinates, RawRecord, SourceId};
use serde::{Deserialize, Serialize};

/// Best-effort decomposition of a free-text address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    pub locality: Option<String>,
}

impl ParsedAddress {
    pub fn is_empty(&self) -> bool {
        self.street_number.is_none() && self.street_name.is_none() && self.locality.is_none()
    }
}

/// Fields the normalizer could not parse; the raw value is kept instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseField {
    Address,
    Phone,
    Coordinates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub field: ParseField,
    pub raw: String,
}

/// A raw record plus its comparable, canonicalized fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub raw: RawRecord,
    pub normalized_name: String,
    pub name_tokens: Vec<String>,
    pub normalized_address: Option<String>,
    pub address: ParsedAddress,
    pub street_tokens: Vec<String>,
    pub normalized_phone: Option<String>,
    pub cuisine_tags: Vec<String>,
    pub warnings: Vec<ParseWarning>,
}

impl NormalizedRecord {
    #[inline]
    pub fn source(&self) -> SourceId {
        self.raw.source_id
    }

    #[inline]
    pub fn key(&self) -> String {
        self.raw.key()
    }

    /// Coordinates usable for blocking (invalid ones are treated as absent).
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.raw.coordinates.filter(Coordinates::is_valid)
    }

    pub fn locality(&self) -> Option<&str> {
        self.address.locality.as_deref()
    }

    /// Number of populated descriptive fields, used to pick the better of
    /// two internal duplicates.
    pub fn completeness(&self) -> usize {
        let raw = &self.raw;
        [
            !self.normalized_name.is_empty(),
            self.normalized_address.is_some(),
            self.normalized_phone.is_some(),
            self.coordinates().is_some(),
            raw.price_range.is_some(),
            !self.cuisine_tags.is_empty(),
            !raw.review_snippets.is_empty(),
            raw.neighborhood.is_some(),
            raw.description.is_some(),
            raw.hours.is_some(),
            raw.website.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
