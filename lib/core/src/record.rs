use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The collaborator a raw record was collected from.
///
/// Variants are declared in priority order: when sources disagree and a
/// field rule says "highest priority wins", `Google` beats `Osm`, which
/// beats `OpenTable`, and so on. The derived `Ord` follows that order, so
/// sorting a slice of sources puts the most trusted one first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Google,
    Osm,
    OpenTable,
    Resy,
    Website,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Google,
        SourceId::Osm,
        SourceId::OpenTable,
        SourceId::Resy,
        SourceId::Website,
    ];

    /// Rank in the tie-break order, 0 being the most trusted source.
    #[inline]
    pub fn priority(self) -> u8 {
        self as u8
    }

    /// Mapping/places sources carry the most reliable coordinates.
    #[inline]
    pub fn is_mapping(self) -> bool {
        matches!(self, SourceId::Google | SourceId::Osm)
    }

    /// Reservation platforms carry the most reliable price ranges.
    #[inline]
    pub fn is_reservation(self) -> bool {
        matches!(self, SourceId::OpenTable | SourceId::Resy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Google => "google",
            SourceId::Osm => "osm",
            SourceId::OpenTable => "opentable",
            SourceId::Resy => "resy",
            SourceId::Website => "website",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(SourceId::Google),
            "osm" => Ok(SourceId::Osm),
            "opentable" => Ok(SourceId::OpenTable),
            "resy" => Ok(SourceId::Resy),
            "website" => Ok(SourceId::Website),
            other => Err(crate::Error::Source {
                source_id: other.to_string(),
                message: "unknown source".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[inline]
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A review as scraped; the timestamp falls back to the record's
/// `retrieved_at` when the source does not date individual reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSnippet {
    pub text: String,
    #[serde(default)]
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl From<&str> for ReviewSnippet {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
            retrieved_at: None,
        }
    }
}

/// One restaurant record as produced by a source collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: SourceId,
    pub source_record_id: String,
    pub name: String,
    #[serde(default)]
    pub address_text: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub cuisine_tags: Vec<String>,
    #[serde(default)]
    pub review_snippets: Vec<ReviewSnippet>,
    pub retrieved_at: DateTime<Utc>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl RawRecord {
    /// Minimal record; the remaining fields are filled with the `with_*` builders.
    pub fn new(
        source_id: SourceId,
        source_record_id: impl Into<String>,
        name: impl Into<String>,
        address_text: impl Into<String>,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id,
            source_record_id: source_record_id.into(),
            name: name.into(),
            address_text: address_text.into(),
            phone: None,
            coordinates: None,
            price_range: None,
            cuisine_tags: Vec::new(),
            review_snippets: Vec::new(),
            retrieved_at,
            neighborhood: None,
            description: None,
            hours: None,
            website: None,
        }
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some(Coordinates::new(lat, lon));
        self
    }

    #[must_use]
    pub fn with_price_range(mut self, price_range: impl Into<String>) -> Self {
        self.price_range = Some(price_range.into());
        self
    }

    #[must_use]
    pub fn with_cuisine_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cuisine_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_review(mut self, text: impl Into<String>, retrieved_at: Option<DateTime<Utc>>) -> Self {
        self.review_snippets.push(ReviewSnippet {
            text: text.into(),
            retrieved_at,
        });
        self
    }

    #[must_use]
    pub fn with_neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_hours(mut self, hours: impl Into<String>) -> Self {
        self.hours = Some(hours.into());
        self
    }

    #[must_use]
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// `source:source_record_id`, unique across all sources.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_id, self.source_record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_priority_order() {
        let mut sources = vec![SourceId::Website, SourceId::Resy, SourceId::Google, SourceId::OpenTable, SourceId::Osm];
        sources.sort();
        assert_eq!(sources, SourceId::ALL.to_vec());
        assert!(SourceId::Google.priority() < SourceId::Website.priority());
    }

    #[test]
    fn test_source_classes() {
        assert!(SourceId::Google.is_mapping());
        assert!(SourceId::Osm.is_mapping());
        assert!(SourceId::Resy.is_reservation());
        assert!(!SourceId::Website.is_mapping());
        assert!(!SourceId::Website.is_reservation());
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("OpenTable".parse::<SourceId>().unwrap(), SourceId::OpenTable);
        assert!("yelp".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_raw_record_deserializes_with_defaults() {
        let json = r#"{
            "source_id": "resy",
            "source_record_id": "r-1",
            "name": "Lilia",
            "retrieved_at": "2024-05-01T12:00:00Z"
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_id, SourceId::Resy);
        assert!(record.address_text.is_empty());
        assert!(record.review_snippets.is_empty());
        assert_eq!(record.key(), "resy:r-1");
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(40.72, -73.99).is_valid());
        assert!(!Coordinates::new(140.0, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
