//! Semantic search over the live vector index.

use crate::collection::{IndexSnapshot, VectorIndex};
use crate::embedder::EmbeddingProvider;
use crate::location::LocationExtractor;
use dishx_core::{CanonicalEntity, Error, Result, Vector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Fill a short location-filtered result list from adjacent neighborhoods
    #[serde(default = "default_widen")]
    pub widen_to_adjacent: bool,
}

fn default_k() -> usize {
    5
}

fn default_widen() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            widen_to_adjacent: default_widen(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub entity: CanonicalEntity,
    pub score: f32,
}

/// Result of a location-aware search.
#[derive(Debug, Clone, Serialize)]
pub struct LocatedSearch {
    /// Query text actually embedded
    pub query: String,
    pub location: Option<String>,
    /// Adjacent neighborhoods that contributed hits
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub widened_to: Vec<String>,
    pub hits: Vec<SearchHit>,
}

pub struct SearchEngine {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    config: SearchConfig,
    locations: LocationExtractor,
}

impl SearchEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>, config: SearchConfig) -> Result<Self> {
        let locations =
            LocationExtractor::new().map_err(|e| Error::InvalidConfig(format!("location patterns: {e}")))?;
        Ok(Self {
            provider,
            index,
            config,
            locations,
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Embed `query` for `snapshot`, checking the vector size.
    async fn embed_for(&self, snapshot: &IndexSnapshot, query: &str) -> Result<Vector> {
        let embedding = self.provider.embed(query).await?;
        if embedding.len() != snapshot.dimensions() {
            return Err(Error::InvalidDimension {
                expected: snapshot.dimensions(),
                actual: embedding.len(),
            });
        }
        Ok(Vector::new(embedding))
    }

    fn scan<F>(snapshot: &IndexSnapshot, query: &Vector, k: usize, filter: F) -> Vec<SearchHit>
    where
        F: Fn(&CanonicalEntity) -> bool,
    {
        snapshot
            .search(query, k, filter)
            .into_iter()
            .map(|(entity, score)| SearchHit { entity, score })
            .collect()
    }

    async fn ranked<F>(&self, query: &str, k: usize, filter: F) -> Result<Vec<SearchHit>>
    where
        F: Fn(&CanonicalEntity) -> bool,
    {
        let snapshot = self.index.snapshot();
        if k == 0 || snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embed_for(&snapshot, query).await?;
        let hits = Self::scan(&snapshot, &embedding, k, filter);
        debug!(query, k, hits = hits.len(), indexed = snapshot.len(), "search");
        Ok(hits)
    }

    /// Top `k` entities (default from config) by cosine similarity to the
    /// query, ties broken by entity id.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchHit>> {
        let k = k.unwrap_or(self.config.default_k);
        self.ranked(query, k, |_| true).await
    }

    /// Like [`search`](Self::search), but a neighborhood mentioned in the
    /// query is removed from the embedded text and used as a filter.
    pub async fn search_with_location(&self, query: &str, k: Option<usize>) -> Result<LocatedSearch> {
        let k = k.unwrap_or(self.config.default_k);
        let (stripped, location) = self.locations.extract(query);

        let Some(location) = location else {
            let hits = self.ranked(query, k, |_| true).await?;
            return Ok(LocatedSearch {
                query: query.to_string(),
                location: None,
                widened_to: Vec::new(),
                hits,
            });
        };

        // a query that is only a location still needs text to embed
        let text = if stripped.is_empty() { query.to_string() } else { stripped };
        let in_area = |entity: &CanonicalEntity, area: &str| {
            entity
                .neighborhood
                .as_deref()
                .is_some_and(|n| self.locations.matches(n, area))
        };

        let snapshot = self.index.snapshot();
        if k == 0 || snapshot.is_empty() {
            return Ok(LocatedSearch {
                query: text,
                location: Some(location.to_string()),
                widened_to: Vec::new(),
                hits: Vec::new(),
            });
        }

        let embedding = self.embed_for(&snapshot, &text).await?;
        let mut hits = Self::scan(&snapshot, &embedding, k, |entity| in_area(entity, location));

        let mut widened_to = Vec::new();
        let around = self.locations.adjacent(location);
        if self.config.widen_to_adjacent && hits.len() < k && !around.is_empty() {
            // strict matches stay ahead of the adjacent ones
            let extra = Self::scan(&snapshot, &embedding, k - hits.len(), |entity| {
                !in_area(entity, location) && around.iter().any(|area| in_area(entity, *area))
            });
            for hit in &extra {
                let area = around.iter().copied().find(|area| in_area(&hit.entity, *area));
                if let Some(area) = area {
                    if !widened_to.iter().any(|w: &String| w.as_str() == area) {
                        widened_to.push(area.to_string());
                    }
                }
            }
            hits.extend(extra);
        }
        debug!(query = %text, location, k, hits = hits.len(), widened = widened_to.len(), "located search");

        Ok(LocatedSearch {
            query: text,
            location: Some(location.to_string()),
            widened_to,
            hits,
        })
    }
}
