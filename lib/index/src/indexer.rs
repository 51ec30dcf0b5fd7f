//! Embedding indexer
//!
//! Computes summary embeddings for canonical entities and publishes them
//! to the [`VectorIndex`]. A pass runs the provider calls concurrently on a
//! bounded pool, each call under a timeout with exponential-backoff
//! retries. Failures never abort the pass: the entity simply stays out of
//! the index until a later pass succeeds.

use crate::collection::{IndexSnapshot, VectorIndex};
use crate::embedder::EmbeddingProvider;
use crate::error::{EmbeddingError, Result};
use crate::summary::{summary_hash, summary_text, SummaryConfig};
use dishx_core::{CanonicalEntity, RunContext, RunIssue, Vector};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum provider calls in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before retry `n` is `retry_base_delay_ms * 2^n`
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default)]
    pub summary: SummaryConfig,
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    2_000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            summary: SummaryConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.concurrency == 0 {
            return Err("indexing.concurrency must be at least 1".into());
        }
        if self.timeout_ms == 0 {
            return Err("indexing.timeout_ms must be positive".into());
        }
        if self.summary.max_summary_chars == 0 {
            return Err("indexing.summary.max_summary_chars must be positive".into());
        }
        Ok(())
    }
}

/// What happened to one entity during [`Indexer::embed_entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStatus {
    Embedded,
    /// Summary unchanged and an embedding is already present
    Unchanged,
}

/// Totals of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub indexed: usize,
}

pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    config: IndexConfig,
    pass_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>, config: IndexConfig) -> Self {
        Self {
            provider,
            index,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// One provider call with timeout and retries; checks the vector size.
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.provider.name().to_string();
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut attempt: u32 = 0;

        loop {
            let result = match tokio::time::timeout(timeout, self.provider.embed(text)).await {
                Ok(Ok(vector)) if vector.len() != self.provider.dimensions() => Err(EmbeddingError::Dimension {
                    provider: provider.clone(),
                    expected: self.provider.dimensions(),
                    actual: vector.len(),
                }),
                Ok(result) => result,
                Err(_) => Err(EmbeddingError::Timeout {
                    provider: provider.clone(),
                    timeout_ms: self.config.timeout_ms,
                }),
            };

            match result {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay_ms.saturating_mul(1u64 << attempt.min(16));
                    warn!(provider = %provider, attempt = attempt + 1, delay_ms = delay, error = %e, "embedding failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Refresh the embedding of one entity, skipping the call when the
    /// summary has not changed since the stored embedding was computed.
    ///
    /// On failure the entity is left without an embedding.
    pub async fn embed_entity(&self, entity: &mut CanonicalEntity) -> Result<EmbedStatus> {
        let text = summary_text(entity, &self.config.summary);
        let hash = summary_hash(&text);

        let fresh = entity.summary_hash.as_deref() == Some(hash.as_str())
            && entity.embedding.as_ref().is_some_and(|v| v.dim() == self.provider.dimensions());
        if fresh {
            return Ok(EmbedStatus::Unchanged);
        }

        entity.embedding = None;
        entity.summary_hash = None;
        let vector = self.embed_with_retry(&text).await?;
        entity.embedding = Some(Vector::new(vector));
        entity.summary_hash = Some(hash);
        Ok(EmbedStatus::Embedded)
    }

    /// Run a full pass over `entities` and publish a new index snapshot.
    ///
    /// Passes are serialized; the snapshot is swapped only after every call
    /// of the pass has completed or failed.
    pub async fn index_all(&self, ctx: &RunContext, entities: &mut [CanonicalEntity]) -> IndexOutcome {
        let _pass = self.pass_lock.lock().await;
        let concurrency = self.config.concurrency.max(1);

        let results: Vec<(usize, Result<EmbedStatus>)> = stream::iter(entities.iter_mut().enumerate())
            .map(|(idx, entity)| async move { (idx, self.embed_entity(entity).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = IndexOutcome::default();
        let mut failures: Vec<(usize, EmbeddingError)> = Vec::new();
        for (idx, result) in results {
            match result {
                Ok(EmbedStatus::Embedded) => outcome.embedded += 1,
                Ok(EmbedStatus::Unchanged) => outcome.skipped += 1,
                Err(e) => failures.push((idx, e)),
            }
        }

        failures.sort_by_key(|(idx, _)| *idx);
        outcome.failed = failures.len();
        for (idx, e) in failures {
            let entity_id = entities[idx].id.clone();
            warn!(entity_id = %entity_id, error = %e, "entity left unindexed");
            ctx.record(RunIssue::ExternalServiceFailure {
                entity_id,
                provider: e.provider().to_string(),
                message: e.to_string(),
            });
        }

        let snapshot = self.index.swap(IndexSnapshot::build(entities.iter(), self.provider.dimensions()));
        outcome.indexed = snapshot.len();

        ctx.update_counts(|counts| {
            counts.embedded = outcome.embedded;
            counts.embedding_skipped = outcome.skipped;
            counts.embedding_failures = outcome.failed;
        });
        info!(
            provider = self.provider.name(),
            embedded = outcome.embedded,
            skipped = outcome.skipped,
            failed = outcome.failed,
            indexed = outcome.indexed,
            "indexing pass complete"
        );
        outcome
    }

    /// Publish a snapshot of already-embedded entities without calling the
    /// provider, e.g. when serving a store loaded from disk.
    pub fn load(&self, entities: &[CanonicalEntity]) -> usize {
        let snapshot = self.index.swap(IndexSnapshot::build(entities.iter(), self.provider.dimensions()));
        debug!(indexed = snapshot.len(), "index loaded from stored embeddings");
        snapshot.len()
    }
}
