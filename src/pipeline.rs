//! End-to-end ingestion run
//!
//! ```text
//! sources -> normalize -> match -> fuse -> merge with store -> index -> save
//! ```

use dishx_core::{CanonicalEntity, Error, RawRecord, Result, RunContext, RunReport, SourceRef};
use dishx_fusion::{merge_with_stored, Fuser};
use dishx_index::{EmbeddingProvider, IndexConfig, Indexer, SearchConfig, SearchEngine, VectorIndex};
use dishx_matching::{normalize_all, MatchConfig, Matcher};
use dishx_storage::{collect_all, EntityStore, SourceCollector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Top-level configuration, loaded from an optional JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub indexing: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Read and validate a config file; `None` gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                serde_json::from_str(&text).map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?
            }
            None => Config::default(),
        };
        config.validate_and_normalize()?;
        Ok(config)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        self.matching.validate_and_normalize()?;
        self.indexing.validate().map_err(Error::InvalidConfig)?;
        if self.search.default_k == 0 {
            return Err(Error::InvalidConfig("search.default_k must be at least 1".into()));
        }
        Ok(())
    }
}

pub struct Pipeline {
    store: Arc<EntityStore>,
    matcher: Matcher,
    fuser: Fuser,
    indexer: Indexer,
    search: SearchConfig,
}

impl Pipeline {
    pub fn new(config: Config, store: Arc<EntityStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let index = Arc::new(VectorIndex::new());
        Self {
            store,
            matcher: Matcher::new(config.matching),
            fuser: Fuser::new(),
            indexer: Indexer::new(provider, index, config.indexing),
            search: config.search,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.indexer.index()
    }

    /// Normalize, match and fuse a batch of raw records.
    pub fn resolve(&self, ctx: &RunContext, raws: Vec<RawRecord>) -> Vec<CanonicalEntity> {
        let normalized = normalize_all(ctx, raws);
        let clusters = self.matcher.match_records(ctx, normalized);
        self.fuser.fuse_all(ctx, &clusters)
    }

    /// Collect from every source, then [`ingest`](Self::ingest).
    pub async fn run(&self, ctx: &RunContext, collectors: &[Box<dyn SourceCollector>]) -> Result<RunReport> {
        let raws = collect_all(ctx, collectors)?;
        self.ingest(ctx, raws).await
    }

    /// Resolve `raws` into the store, refresh embeddings, persist the store
    /// and the run report.
    pub async fn ingest(&self, ctx: &RunContext, raws: Vec<RawRecord>) -> Result<RunReport> {
        if raws.is_empty() {
            return Err(Error::NoInput);
        }
        ctx.update_counts(|counts| counts.raw_records = raws.len());

        let fused = self.resolve(ctx, raws);
        let (merged, superseded) = reconcile(fused, &self.store.list());
        self.store.upsert_all(merged);
        let removed = self.store.remove_all(&superseded);
        if removed > 0 {
            info!(superseded = removed, "stored entities folded into re-identified entities");
        }
        ctx.update_counts(|counts| counts.superseded = removed);

        // index the whole store so entities from earlier runs stay searchable
        let mut entities = self.store.list();
        self.indexer.index_all(ctx, &mut entities).await;
        self.store.upsert_all(entities);
        self.store.save()?;

        let report = ctx.finish();
        let path = self.store.save_report(&report)?;
        info!(
            run_id = %report.run_id,
            entities = report.counts.entities,
            stored = self.store.len(),
            issues = report.issues.len(),
            report = %path.display(),
            "run complete"
        );
        Ok(report)
    }

    /// Publish the stored embeddings without calling the provider.
    pub fn load_index(&self) -> usize {
        self.indexer.load(&self.store.list())
    }

    pub fn search_engine(&self) -> Result<SearchEngine> {
        SearchEngine::new(self.indexer.provider().clone(), self.indexer.index().clone(), self.search.clone())
    }
}

/// Fold a run's fused entities into the stored set.
///
/// A raw record belongs to exactly one stored entity. When a cluster's id
/// changes between runs (its highest-priority member changed), the stored
/// entity under the old id is merged into the fresh one and returned for
/// removal. Stored entities that lose only some of their records keep the
/// rest.
fn reconcile(fused: Vec<CanonicalEntity>, stored: &[CanonicalEntity]) -> (Vec<CanonicalEntity>, Vec<String>) {
    let owner: HashMap<SourceRef, usize> = fused
        .iter()
        .enumerate()
        .flat_map(|(i, entity)| entity.source_records.iter().map(move |r| (r.clone(), i)))
        .collect();
    let fresh_ids: HashMap<&str, usize> = fused.iter().enumerate().map(|(i, e)| (e.id.as_str(), i)).collect();

    let mut same_id: Vec<Option<&CanonicalEntity>> = vec![None; fused.len()];
    let mut absorbed: Vec<Vec<&CanonicalEntity>> = vec![Vec::new(); fused.len()];
    let mut trimmed = Vec::new();
    let mut superseded = Vec::new();

    for old in stored {
        if let Some(&i) = fresh_ids.get(old.id.as_str()) {
            same_id[i] = Some(old);
            continue;
        }
        let claimers: BTreeSet<usize> = old.source_records.iter().filter_map(|r| owner.get(r).copied()).collect();
        if claimers.is_empty() {
            continue;
        }
        if old.source_records.iter().all(|r| owner.contains_key(r)) {
            superseded.push(old.id.clone());
            // split across several fresh entities: each already holds its share
            if claimers.len() == 1 {
                if let Some(&only) = claimers.first() {
                    absorbed[only].push(old);
                }
            }
        } else {
            let mut rest = old.clone();
            rest.source_records.retain(|r| !owner.contains_key(r));
            trimmed.push(rest);
        }
    }

    let mut merged: Vec<CanonicalEntity> = fused
        .into_iter()
        .enumerate()
        .map(|(i, mut entity)| {
            for old in &absorbed[i] {
                entity = merge_with_stored(entity, old);
            }
            if let Some(old) = same_id[i] {
                entity = merge_with_stored(entity, old);
            }
            entity.source_records.retain(|r| owner.get(r).map_or(true, |&o| o == i));
            entity
        })
        .collect();
    merged.extend(trimmed);
    (merged, superseded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dishx_core::SourceId;
    use dishx_index::HashEmbedder;

    fn pipeline(dir: &Path) -> Pipeline {
        let store = Arc::new(EntityStore::open(dir).unwrap());
        Pipeline::new(Config::default(), store, Arc::new(HashEmbedder::new(64)))
    }

    #[test]
    fn test_config_defaults_and_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"search": {"default_k": 3}}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.search.default_k, 3);
        assert_eq!(config.matching, MatchConfig::default());
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"indexing": {"concurrency": 0}}"#).unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(Error::InvalidConfig(_))));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_empty_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let err = p.ingest(&RunContext::new(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::NoInput));
    }

    #[tokio::test]
    async fn test_ingest_persists_store_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let raws = vec![
            RawRecord::new(SourceId::Google, "g1", "Katz's Delicatessen", "205 E Houston St, New York", now)
                .with_coordinates(40.7223, -73.9874),
            RawRecord::new(SourceId::Resy, "r1", "Katzs Delicatessen", "205 East Houston Street, New York", now)
                .with_coordinates(40.7222, -73.9873),
        ];

        {
            let p = pipeline(dir.path());
            let report = p.ingest(&RunContext::with_clock(now), raws).await.unwrap();
            assert_eq!(report.counts.entities, 1);
            assert_eq!(report.counts.embedded, 1);
            assert_eq!(p.index().len(), 1);
        }

        let reopened = pipeline(dir.path());
        assert_eq!(reopened.store().len(), 1);
        assert_eq!(reopened.load_index(), 1);
        let last = reopened.store().last_report().unwrap().unwrap();
        assert_eq!(last.counts.raw_records, 2);

        let hits = reopened.search_engine().unwrap().search("katz deli", None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    fn lilia(source: SourceId, id: &str, at: chrono::DateTime<Utc>) -> RawRecord {
        RawRecord::new(source, id, "Lilia", "567 Union Ave, Brooklyn", at)
    }

    #[tokio::test]
    async fn test_rescraped_reviews_are_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let mut embedded = Vec::new();
        for day in 1..=3 {
            let at = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
            let raw = lilia(SourceId::Google, "g1", at).with_review("Best pasta in town", None);
            let report = p.ingest(&RunContext::with_clock(at), vec![raw]).await.unwrap();
            embedded.push(report.counts.embedded);
        }

        let entities = p.store().list();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].reviews.len(), 1);
        assert_eq!(entities[0].reviews[0].retrieved_at, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(embedded, [1, 0, 0]);
    }

    #[tokio::test]
    async fn test_reidentified_cluster_replaces_stored_entity() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();

        p.ingest(&RunContext::with_clock(t0), vec![lilia(SourceId::Resy, "r1", t0).with_phone("718-576-3095")])
            .await
            .unwrap();
        let report = p
            .ingest(
                &RunContext::with_clock(t1),
                vec![lilia(SourceId::Resy, "r1", t1), lilia(SourceId::Google, "g1", t1)],
            )
            .await
            .unwrap();
        assert_eq!(report.counts.superseded, 1);

        let entities = p.store().list();
        assert_eq!(entities.len(), 1);
        let entity = &entities[0];
        assert_eq!(entity.id, dishx_fusion::stable_id(SourceId::Google, "g1"));
        assert_eq!(entity.source_records.len(), 2);
        assert_eq!(entity.created_at, t0);
        assert_eq!(entity.phone.as_deref(), Some("718-576-3095"));

        let hits = p.search_engine().unwrap().search("Lilia", Some(5)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_partially_claimed_entity_keeps_its_other_records() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let source_ref = |source, id: &str| SourceRef {
            source,
            source_record_id: id.to_string(),
        };
        let mut old = CanonicalEntity::new("rst_old", "Lilia", SourceId::Resy, t);
        old.source_records = [source_ref(SourceId::Resy, "r1"), source_ref(SourceId::Website, "w1")].into();
        let mut fresh = CanonicalEntity::new("rst_new", "Lilia", SourceId::Google, t);
        fresh.source_records = [source_ref(SourceId::Google, "g1"), source_ref(SourceId::Resy, "r1")].into();

        let (merged, superseded) = reconcile(vec![fresh], &[old]);
        assert!(superseded.is_empty());
        assert_eq!(merged.len(), 2);
        let kept = merged.iter().find(|e| e.id == "rst_old").unwrap();
        assert_eq!(kept.source_records, BTreeSet::from([source_ref(SourceId::Website, "w1")]));
    }
}
