//! Entity fuser
//!
//! Resolves each canonical field from the members of a match cluster and
//! records which source supplied it.
//!
//! # Field rules
//! Members are visited in source priority order (google, osm, opentable,
//! resy, website):
//! - name, address, phone, website: first member with a value
//! - neighborhood: first raw neighborhood, else first parsed locality
//! - coordinates: mapping sources first, else any member
//! - price_range: reservation platforms first, else mapping sources
//! - hours: first member with a value (google before osm before the rest)
//! - cuisine_tags: union
//! - reviews: every snippet, oldest first
//! - description: distinct descriptions joined in priority order
//!
//! # Conflict detection
//! When two members carry different values for name, address, price range
//! or phone, a [`ConflictReport`] with their Levenshtein similarity is
//! added to the run report. The winning value is unaffected.

use crate::identity::cluster_id;
use dishx_core::{
    CanonicalEntity, ConflictReport, Field, MatchCluster, NormalizedRecord, Review, RunContext, RunIssue, SourceId,
    SourceRef,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Separator between descriptions contributed by different sources.
const DESCRIPTION_SEPARATOR: &str = " ";

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct Fuser;

impl Fuser {
    pub fn new() -> Self {
        Self
    }

    /// Fuse one cluster. Returns `None` only for a cluster without members.
    pub fn fuse(&self, ctx: &RunContext, cluster: &MatchCluster) -> Option<CanonicalEntity> {
        let id = cluster_id(cluster)?;

        let mut members: Vec<&NormalizedRecord> = cluster.members.iter().collect();
        members.sort_by_key(|m| m.source().priority());
        let primary = *members.first()?;

        let mut entity = CanonicalEntity::new(id, primary.raw.name.trim(), primary.source(), ctx.now());
        entity.match_confidence = cluster.confidence;

        let address = first_value(&members, |m| Some(m.raw.address_text.trim()).filter(|a| !a.is_empty()));
        assign_text(&mut entity, Field::Address, address);

        let neighborhood = first_value(&members, |m| non_empty(m.raw.neighborhood.as_ref()))
            .or_else(|| first_value(&members, |m| m.locality()));
        assign_text(&mut entity, Field::Neighborhood, neighborhood);

        let coordinates = |m: &NormalizedRecord| m.coordinates();
        let mapping: Vec<&NormalizedRecord> = members.iter().copied().filter(|m| m.source().is_mapping()).collect();
        if let Some((coords, source)) =
            first_copy(&mapping, coordinates).or_else(|| first_copy(&members, coordinates))
        {
            entity.coordinates = Some(coords);
            entity.field_provenance.insert(Field::Coordinates, source);
        }

        let reservation: Vec<&NormalizedRecord> =
            members.iter().copied().filter(|m| m.source().is_reservation()).collect();
        let price = first_value(&reservation, |m| non_empty(m.raw.price_range.as_ref()))
            .or_else(|| first_value(&mapping, |m| non_empty(m.raw.price_range.as_ref())));
        assign_text(&mut entity, Field::PriceRange, price);

        assign_text(&mut entity, Field::Phone, first_value(&members, |m| non_empty(m.raw.phone.as_ref())));
        assign_text(&mut entity, Field::Hours, first_value(&members, |m| non_empty(m.raw.hours.as_ref())));
        assign_text(&mut entity, Field::Website, first_value(&members, |m| non_empty(m.raw.website.as_ref())));

        let mut tags = BTreeSet::new();
        for member in &members {
            if !member.cuisine_tags.is_empty() && tags.is_empty() {
                entity.field_provenance.insert(Field::CuisineTags, member.source());
            }
            tags.extend(member.cuisine_tags.iter().cloned());
        }
        entity.cuisine_tags = tags;

        let mut descriptions: Vec<&str> = Vec::new();
        for member in &members {
            if let Some(description) = non_empty(member.raw.description.as_ref()) {
                if descriptions.is_empty() {
                    entity.field_provenance.insert(Field::Description, member.source());
                }
                if !descriptions.contains(&description) {
                    descriptions.push(description);
                }
            }
        }
        if !descriptions.is_empty() {
            entity.description = Some(descriptions.join(DESCRIPTION_SEPARATOR));
        }

        entity.reviews = collect_reviews(&members);
        if let Some(first) = members.iter().find(|m| !m.raw.review_snippets.is_empty()) {
            entity.field_provenance.insert(Field::Reviews, first.source());
        }

        entity.source_records = cluster
            .members
            .iter()
            .chain(cluster.duplicates.iter())
            .map(|r| SourceRef {
                source: r.source(),
                source_record_id: r.raw.source_record_id.clone(),
            })
            .collect();

        let conflicts = detect_conflicts(&entity.id, &members);
        if !conflicts.is_empty() {
            debug!(entity_id = %entity.id, conflicts = conflicts.len(), "field conflicts detected");
        }
        ctx.record_all(conflicts.into_iter().map(RunIssue::FieldConflict));

        Some(entity)
    }

    /// Fuse every cluster, in cluster order.
    pub fn fuse_all(&self, ctx: &RunContext, clusters: &[MatchCluster]) -> Vec<CanonicalEntity> {
        let entities: Vec<CanonicalEntity> = clusters.iter().filter_map(|c| self.fuse(ctx, c)).collect();
        ctx.update_counts(|counts| counts.entities = entities.len());
        entities
    }
}

fn first_value<'a, F>(members: &[&'a NormalizedRecord], pick: F) -> Option<(&'a str, SourceId)>
where
    F: Fn(&'a NormalizedRecord) -> Option<&'a str>,
{
    members.iter().find_map(|m| pick(*m).map(|v| (v, m.source())))
}

fn first_copy<T, F>(members: &[&NormalizedRecord], pick: F) -> Option<(T, SourceId)>
where
    F: Fn(&NormalizedRecord) -> Option<T>,
{
    members.iter().find_map(|m| pick(*m).map(|v| (v, m.source())))
}

/// Store a resolved text field and its provenance.
fn assign_text(entity: &mut CanonicalEntity, field: Field, resolved: Option<(&str, SourceId)>) {
    let Some((value, source)) = resolved else {
        return;
    };
    let slot = match field {
        Field::Neighborhood => &mut entity.neighborhood,
        Field::Address => &mut entity.address,
        Field::PriceRange => &mut entity.price_range,
        Field::Phone => &mut entity.phone,
        Field::Hours => &mut entity.hours,
        Field::Description => &mut entity.description,
        Field::Website => &mut entity.website,
        Field::Name | Field::Coordinates | Field::CuisineTags | Field::Reviews => return,
    };
    *slot = Some(value.to_string());
    entity.field_provenance.insert(field, source);
}

/// All review snippets, oldest first; ties keep source priority and then
/// the order the source listed them in.
fn collect_reviews(members: &[&NormalizedRecord]) -> Vec<Review> {
    let mut keyed: Vec<(chrono::DateTime<chrono::Utc>, u8, usize, usize, Review)> = Vec::new();
    for (member_pos, member) in members.iter().enumerate() {
        for (review_pos, snippet) in member.raw.review_snippets.iter().enumerate() {
            let text = snippet.text.trim();
            if text.is_empty() {
                continue;
            }
            let retrieved_at = snippet.retrieved_at.unwrap_or(member.raw.retrieved_at);
            keyed.push((
                retrieved_at,
                member.source().priority(),
                member_pos,
                review_pos,
                Review {
                    text: text.to_string(),
                    source: member.source(),
                    retrieved_at,
                },
            ));
        }
    }
    keyed.sort_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)));
    keyed.into_iter().map(|(_, _, _, _, review)| review).collect()
}

fn detect_conflicts(entity_id: &str, members: &[&NormalizedRecord]) -> Vec<ConflictReport> {
    type Extract = fn(&NormalizedRecord) -> Option<(String, String)>;
    let fields: [(Field, Extract); 4] = [
        (Field::Name, |m| Some((m.normalized_name.clone(), m.raw.name.trim().to_string())).filter(|(k, _)| !k.is_empty())),
        (Field::Address, |m| m.normalized_address.clone().map(|k| (k, m.raw.address_text.trim().to_string()))),
        (Field::PriceRange, |m| {
            non_empty(m.raw.price_range.as_ref()).map(|p| (p.to_lowercase(), p.to_string()))
        }),
        (Field::Phone, |m| {
            m.normalized_phone.clone().zip(m.raw.phone.as_ref().map(|p| p.trim().to_string()))
        }),
    ];

    let mut conflicts = Vec::new();
    for (field, extract) in fields {
        let values: Vec<(SourceId, String, String)> = members
            .iter()
            .filter_map(|m| extract(m).map(|(key, shown)| (m.source(), key, shown)))
            .collect();
        for (i, (source1, key1, value1)) in values.iter().enumerate() {
            for (source2, key2, value2) in &values[i + 1..] {
                if key1 != key2 {
                    conflicts.push(ConflictReport {
                        entity_id: entity_id.to_string(),
                        field,
                        source1: *source1,
                        value1: value1.clone(),
                        source2: *source2,
                        value2: value2.clone(),
                        similarity: strsim::normalized_levenshtein(key1, key2),
                    });
                }
            }
        }
    }
    conflicts
}
