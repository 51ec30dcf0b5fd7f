use dishx_core::{CanonicalEntity, Vector};
use parking_lot::RwLock;
use std::sync::Arc;

/// One searchable entity with its unit-length embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub entity: CanonicalEntity,
    pub vector: Vector,
}

/// An immutable view of every embedded entity at the end of one pass.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl IndexSnapshot {
    /// Build a snapshot from entities; those without an embedding of the
    /// expected size are left out.
    pub fn build<'a, I>(entities: I, dimensions: usize) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalEntity>,
    {
        let mut entries: Vec<IndexEntry> = entities
            .into_iter()
            .filter_map(|entity| {
                let vector = entity.embedding.as_ref()?;
                if vector.dim() != dimensions || !vector.is_finite() {
                    return None;
                }
                Some(IndexEntry {
                    entity: entity.clone(),
                    vector: vector.normalized(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));
        Self { entries, dimensions }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Linear cosine scan. Results are ordered by descending score, ties by
    /// entity id, and cut to `limit`.
    pub fn search<F>(&self, query: &Vector, limit: usize, filter: F) -> Vec<(CanonicalEntity, f32)>
    where
        F: Fn(&CanonicalEntity) -> bool,
    {
        if limit == 0 {
            return Vec::new();
        }
        let normalized_query = query.normalized();

        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .filter(|entry| filter(&entry.entity))
            .map(|entry| (entry, entry.vector.dot(&normalized_query)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.entity.id.cmp(&b.0.entity.id)));
        scored.truncate(limit);
        scored.into_iter().map(|(entry, score)| (entry.entity.clone(), score)).collect()
    }
}

/// The live index. Readers grab the current snapshot; an indexing pass
/// swaps in a complete new one, so no search sees a half-finished pass.
#[derive(Debug, Default)]
pub struct VectorIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    pub fn swap(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = snapshot.clone();
        snapshot
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dishx_core::SourceId;

    fn entity(id: &str, embedding: Option<Vec<f32>>) -> CanonicalEntity {
        let mut e = CanonicalEntity::new(id, id, SourceId::Google, Utc::now());
        e.embedding = embedding.map(Vector::new);
        e
    }

    #[test]
    fn test_build_skips_unembedded_and_wrong_size() {
        let entities = vec![
            entity("rst_a", Some(vec![1.0, 0.0])),
            entity("rst_b", None),
            entity("rst_c", Some(vec![1.0, 0.0, 0.0])),
        ];
        let snapshot = IndexSnapshot::build(&entities, 2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].entity.id, "rst_a");
    }

    #[test]
    fn test_search_orders_by_score_then_id() {
        let entities = vec![
            entity("rst_c", Some(vec![1.0, 0.0])),
            entity("rst_a", Some(vec![1.0, 0.0])),
            entity("rst_b", Some(vec![0.0, 1.0])),
        ];
        let snapshot = IndexSnapshot::build(&entities, 2);
        let hits = snapshot.search(&Vector::new(vec![2.0, 0.5]), 10, |_| true);
        let ids: Vec<&str> = hits.iter().map(|(e, _)| e.id.as_str()).collect();
        assert_eq!(ids, ["rst_a", "rst_c", "rst_b"]);
        assert!(hits[0].1 >= hits[2].1);

        assert_eq!(snapshot.search(&Vector::new(vec![1.0, 0.0]), 1, |_| true).len(), 1);
        assert!(snapshot.search(&Vector::new(vec![1.0, 0.0]), 0, |_| true).is_empty());
    }

    #[test]
    fn test_swap_replaces_snapshot() {
        let index = VectorIndex::new();
        assert!(index.is_empty());
        let held = index.snapshot();

        let entities = vec![entity("rst_a", Some(vec![1.0, 0.0]))];
        index.swap(IndexSnapshot::build(&entities, 2));
        assert_eq!(index.len(), 1);
        // readers holding the old snapshot keep a consistent view
        assert!(held.is_empty());
    }
}
