//! Summary text fed to the embedding provider.

use dishx_core::CanonicalEntity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_max_reviews")]
    pub max_reviews: usize,
    #[serde(default = "default_max_review_chars")]
    pub max_review_chars: usize,
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,
}

fn default_max_reviews() -> usize {
    5
}

fn default_max_review_chars() -> usize {
    300
}

fn default_max_summary_chars() -> usize {
    25_000
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_reviews: default_max_reviews(),
            max_review_chars: default_max_review_chars(),
            max_summary_chars: default_max_summary_chars(),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the text that represents an entity for embedding.
///
/// Sections are separated by blank lines: name, neighborhood, price range,
/// description, cuisine tags, then the most recent reviews (newest first),
/// each cut to `max_review_chars`. The whole text is cut to
/// `max_summary_chars`.
pub fn summary_text(entity: &CanonicalEntity, config: &SummaryConfig) -> String {
    let mut parts = vec![format!("Name: {}", entity.name)];

    if let Some(neighborhood) = &entity.neighborhood {
        parts.push(format!("Neighborhood: {neighborhood}"));
    }
    if let Some(price_range) = &entity.price_range {
        parts.push(format!("Price Range: {price_range}"));
    }
    if let Some(description) = &entity.description {
        parts.push(format!("Description: {description}"));
    }
    if !entity.cuisine_tags.is_empty() {
        let tags: Vec<&str> = entity.cuisine_tags.iter().map(String::as_str).collect();
        parts.push(format!("Cuisine: {}", tags.join(", ")));
    }

    let recent: Vec<String> = entity
        .reviews
        .iter()
        .rev()
        .take(config.max_reviews)
        .map(|r| format!("- {}", truncate_chars(&r.text, config.max_review_chars)))
        .collect();
    if !recent.is_empty() {
        parts.push(format!("Reviews:\n{}", recent.join("\n")));
    }

    let text = parts.join("\n\n");
    truncate_chars(&text, config.max_summary_chars).to_string()
}

/// Content hash of a summary, used to skip re-embedding unchanged entities.
pub fn summary_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dishx_core::{Review, SourceId};

    fn entity() -> CanonicalEntity {
        let mut entity = CanonicalEntity::new("rst_1", "Joe's Pizza", SourceId::Google, Utc::now());
        entity.neighborhood = Some("Greenwich Village".into());
        entity.price_range = Some("$".into());
        entity.cuisine_tags = ["pizza".to_string(), "italian".to_string()].into_iter().collect();
        entity
    }

    fn review(text: String, day: u32) -> Review {
        Review {
            text,
            source: SourceId::Google,
            retrieved_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_summary_sections() {
        let text = summary_text(&entity(), &SummaryConfig::default());
        assert_eq!(
            text,
            "Name: Joe's Pizza\n\nNeighborhood: Greenwich Village\n\nPrice Range: $\n\nCuisine: italian, pizza"
        );
    }

    #[test]
    fn test_reviews_newest_first_and_truncated() {
        let mut e = entity();
        e.reviews = (1..=7).map(|day| review(format!("review {day} {}", "x".repeat(400)), day)).collect();
        let config = SummaryConfig::default();
        let text = summary_text(&e, &config);

        let lines: Vec<&str> = text.lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("- review 7 "));
        assert!(lines[4].starts_with("- review 3 "));
        assert!(lines.iter().all(|l| l.chars().count() == 2 + 300));
    }

    #[test]
    fn test_total_cap() {
        let mut e = entity();
        e.description = Some("é".repeat(100));
        let config = SummaryConfig {
            max_summary_chars: 40,
            ..Default::default()
        };
        assert_eq!(summary_text(&e, &config).chars().count(), 40);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = summary_hash("Name: A");
        assert_eq!(a, summary_hash("Name: A"));
        assert_ne!(a, summary_hash("Name: B"));
        assert_eq!(a.len(), 64);
    }
}
