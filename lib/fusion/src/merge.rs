use dishx_core::{CanonicalEntity, Field, Review, SourceId};
use std::collections::BTreeMap;

/// Combine a freshly fused entity with the stored version of the same id.
///
/// Fresh values win where present; stored values (and their provenance)
/// fill the gaps. Reviews and source records are unioned. The stored
/// embedding travels along with its summary hash, and the indexer drops it
/// once the summary changes. `updated_at` only moves when the content
/// actually changed.
pub fn merge_with_stored(fresh: CanonicalEntity, stored: &CanonicalEntity) -> CanonicalEntity {
    let mut merged = fresh;

    macro_rules! fill {
        ($($field:ident => $tag:expr),* $(,)?) => {
            $(
                if merged.$field.is_none() && stored.$field.is_some() {
                    merged.$field = stored.$field.clone();
                    if let Some(source) = stored.provenance($tag) {
                        merged.field_provenance.insert($tag, source);
                    }
                }
            )*
        };
    }

    fill!(
        neighborhood => Field::Neighborhood,
        address => Field::Address,
        coordinates => Field::Coordinates,
        price_range => Field::PriceRange,
        phone => Field::Phone,
        hours => Field::Hours,
        description => Field::Description,
        website => Field::Website,
    );

    if merged.cuisine_tags.is_empty() && !stored.cuisine_tags.is_empty() {
        merged.cuisine_tags = stored.cuisine_tags.clone();
        if let Some(source) = stored.provenance(Field::CuisineTags) {
            merged.field_provenance.insert(Field::CuisineTags, source);
        }
    }

    merged.reviews = union_reviews(&merged.reviews, &stored.reviews);
    if merged.provenance(Field::Reviews).is_none() {
        if let Some(source) = stored.provenance(Field::Reviews) {
            merged.field_provenance.insert(Field::Reviews, source);
        }
    }

    merged.source_records.extend(stored.source_records.iter().cloned());
    merged.embedding = stored.embedding.clone();
    merged.summary_hash = stored.summary_hash.clone();
    merged.created_at = stored.created_at;

    if same_content(&merged, stored) {
        merged.updated_at = stored.updated_at;
    }
    merged
}

/// Reviews from both sides, each `(source, text)` once, oldest first. A
/// review seen again keeps the earliest time it was retrieved.
fn union_reviews(fresh: &[Review], stored: &[Review]) -> Vec<Review> {
    let mut first_seen: BTreeMap<(SourceId, &str), usize> = BTreeMap::new();
    let mut reviews: Vec<Review> = Vec::with_capacity(fresh.len() + stored.len());
    for review in fresh.iter().chain(stored.iter()) {
        match first_seen.get(&(review.source, review.text.as_str())) {
            Some(&slot) => {
                if review.retrieved_at < reviews[slot].retrieved_at {
                    reviews[slot].retrieved_at = review.retrieved_at;
                }
            }
            None => {
                first_seen.insert((review.source, review.text.as_str()), reviews.len());
                reviews.push(review.clone());
            }
        }
    }
    // stable: equal timestamps keep fresh-before-stored order
    reviews.sort_by_key(|r| (r.retrieved_at, r.source));
    reviews
}

fn same_content(a: &CanonicalEntity, b: &CanonicalEntity) -> bool {
    let mut a = a.clone();
    a.updated_at = b.updated_at;
    a.created_at = b.created_at;
    a == *b
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dishx_core::Vector;

    fn entity(now: chrono::DateTime<Utc>) -> CanonicalEntity {
        CanonicalEntity::new("rst_0000000000000001", "Lilia", SourceId::Google, now)
    }

    #[test]
    fn test_stored_values_fill_gaps() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let mut stored = entity(t0);
        stored.phone = Some("718-576-3095".into());
        stored.field_provenance.insert(Field::Phone, SourceId::Osm);
        stored.price_range = Some("$$".into());
        stored.field_provenance.insert(Field::PriceRange, SourceId::Google);

        let mut fresh = entity(t1);
        fresh.price_range = Some("$$$".into());
        fresh.field_provenance.insert(Field::PriceRange, SourceId::Resy);

        let merged = merge_with_stored(fresh, &stored);
        assert_eq!(merged.price_range.as_deref(), Some("$$$"));
        assert_eq!(merged.provenance(Field::PriceRange), Some(SourceId::Resy));
        assert_eq!(merged.phone.as_deref(), Some("718-576-3095"));
        assert_eq!(merged.provenance(Field::Phone), Some(SourceId::Osm));
        assert_eq!(merged.created_at, t0);
        assert_eq!(merged.updated_at, t1);
        assert!(merged.provenance_complete());
    }

    #[test]
    fn test_unchanged_entity_keeps_timestamps_and_embedding() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let mut stored = entity(t0);
        stored.embedding = Some(Vector::new(vec![1.0, 0.0]));
        stored.summary_hash = Some("abc".into());

        let merged = merge_with_stored(entity(t1), &stored);
        assert_eq!(merged, stored);
    }

    #[test]
    fn test_reviews_are_unioned_once() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let review = |text: &str, day: u32| Review {
            text: text.into(),
            source: SourceId::Google,
            retrieved_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        };

        let mut stored = entity(t0);
        stored.reviews = vec![review("great pasta", 1), review("slow service", 2)];
        let mut fresh = entity(t0);
        fresh.reviews = vec![review("slow service", 2), review("new chef", 3)];

        let merged = merge_with_stored(fresh, &stored);
        let texts: Vec<&str> = merged.reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["great pasta", "slow service", "new chef"]);
    }

    #[test]
    fn test_rescraped_review_keeps_first_retrieval() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let review = |at| Review {
            text: "Best pasta in town".into(),
            source: SourceId::Google,
            retrieved_at: at,
        };

        let mut stored = entity(t0);
        stored.reviews = vec![review(t0)];
        let mut fresh = entity(t1);
        fresh.reviews = vec![review(t1)];

        let merged = merge_with_stored(fresh, &stored);
        assert_eq!(merged.reviews, vec![review(t0)]);
        assert_eq!(merged.updated_at, t0);
    }
}
