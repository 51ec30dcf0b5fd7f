use crate::record::{Coordinates, SourceId};
use crate::vector::Vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Canonical fields tracked in the provenance map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Neighborhood,
    Address,
    Coordinates,
    PriceRange,
    CuisineTags,
    Reviews,
    Phone,
    Hours,
    Description,
    Website,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Neighborhood => "neighborhood",
            Field::Address => "address",
            Field::Coordinates => "coordinates",
            Field::PriceRange => "price_range",
            Field::CuisineTags => "cuisine_tags",
            Field::Reviews => "reviews",
            Field::Phone => "phone",
            Field::Hours => "hours",
            Field::Description => "description",
            Field::Website => "website",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub text: String,
    pub source: SourceId,
    pub retrieved_at: DateTime<Utc>,
}

/// Reference back to a raw record that fused into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: SourceId,
    pub source_record_id: String,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.source_record_id)
    }
}

/// The single deduplicated representation of one real-world restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub name: String,
    pub neighborhood: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub price_range: Option<String>,
    pub cuisine_tags: BTreeSet<String>,
    pub reviews: Vec<Review>,
    pub phone: Option<String>,
    pub hours: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub field_provenance: BTreeMap<Field, SourceId>,
    pub source_records: BTreeSet<SourceRef>,
    pub match_confidence: f32,
    pub embedding: Option<Vector>,
    pub summary_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalEntity {
    /// An entity with only an id and a name; everything else unset.
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: SourceId, now: DateTime<Utc>) -> Self {
        let mut field_provenance = BTreeMap::new();
        field_provenance.insert(Field::Name, source);
        Self {
            id: id.into(),
            name: name.into(),
            neighborhood: None,
            address: None,
            coordinates: None,
            price_range: None,
            cuisine_tags: BTreeSet::new(),
            reviews: Vec::new(),
            phone: None,
            hours: None,
            description: None,
            website: None,
            field_provenance,
            source_records: BTreeSet::new(),
            match_confidence: 1.0,
            embedding: None,
            summary_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn provenance(&self, field: Field) -> Option<SourceId> {
        self.field_provenance.get(&field).copied()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn sources(&self) -> BTreeSet<SourceId> {
        self.source_records.iter().map(|r| r.source).collect()
    }

    /// Fields that currently hold a value.
    pub fn populated_fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if !self.name.is_empty() {
            fields.push(Field::Name);
        }
        if self.neighborhood.is_some() {
            fields.push(Field::Neighborhood);
        }
        if self.address.is_some() {
            fields.push(Field::Address);
        }
        if self.coordinates.is_some() {
            fields.push(Field::Coordinates);
        }
        if self.price_range.is_some() {
            fields.push(Field::PriceRange);
        }
        if !self.cuisine_tags.is_empty() {
            fields.push(Field::CuisineTags);
        }
        if !self.reviews.is_empty() {
            fields.push(Field::Reviews);
        }
        if self.phone.is_some() {
            fields.push(Field::Phone);
        }
        if self.hours.is_some() {
            fields.push(Field::Hours);
        }
        if self.description.is_some() {
            fields.push(Field::Description);
        }
        if self.website.is_some() {
            fields.push(Field::Website);
        }
        fields
    }

    /// Every populated field has a provenance entry.
    pub fn provenance_complete(&self) -> bool {
        self.populated_fields()
            .iter()
            .all(|f| self.field_provenance.contains_key(f))
    }
}
