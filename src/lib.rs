//! # DishX
//!
//! Cross-source restaurant entity resolution with field-level fusion and
//! semantic search.
//!
//! Records about the same restaurant arrive from several sources (Google,
//! OpenStreetMap, OpenTable, Resy, restaurant websites) with different
//! spellings, address formats and partial fields. DishX normalizes them,
//! clusters the ones describing the same place, fuses each cluster into a
//! single [`CanonicalEntity`] with per-field provenance, and indexes a
//! summary embedding of every entity for natural-language search.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! dishx ingest --input ./scraped
//! dishx search "late night ramen in the east village" --location-aware
//! dishx serve --http-port 8080
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use dishx::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> dishx::Result<()> {
//! let store = Arc::new(EntityStore::open("./data")?);
//! let pipeline = Pipeline::new(Config::load(None)?, store, Arc::new(HashEmbedder::default()));
//!
//! let collectors: Vec<Box<dyn SourceCollector>> = JsonFileSource::discover("./scraped")
//!     .into_iter()
//!     .map(|s| Box::new(s) as Box<dyn SourceCollector>)
//!     .collect();
//! let report = pipeline.run(&RunContext::new(), &collectors).await?;
//! println!("{} entities, {} issues", report.counts.entities, report.issues.len());
//!
//! let hits = pipeline.search_engine()?.search("pastrami", Some(3)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`dishx-core`](https://docs.rs/dishx-core) - Records, entities, run context and report
//! - [`dishx-matching`](https://docs.rs/dishx-matching) - Normalizer, blocking, pair scoring, clustering
//! - [`dishx-fusion`](https://docs.rs/dishx-fusion) - Field-level fusion and stable ids
//! - [`dishx-index`](https://docs.rs/dishx-index) - Embedding indexer and search
//! - [`dishx-storage`](https://docs.rs/dishx-storage) - Entity store, snapshots, source files
//! - [`dishx-api`](https://docs.rs/dishx-api) - REST API

pub mod pipeline;

pub use dishx_core::{
    CanonicalEntity, Error, Field, MatchCluster, NormalizedRecord, RawRecord, Result, RunContext, RunIssue, RunReport,
    SourceId,
};
pub use dishx_fusion::Fuser;
pub use dishx_index::{
    EmbeddingProvider, HashEmbedder, IndexConfig, Indexer, OpenAiEmbedder, SearchConfig, SearchEngine, SearchHit,
    VectorIndex,
};
pub use dishx_matching::{MatchConfig, Matcher};
pub use dishx_storage::{EntityStore, JsonFileSource, SourceCollector};
pub use pipeline::{Config, Pipeline};

pub use dishx_api::{AppState, RestApi};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CanonicalEntity, Config, EmbeddingProvider, EntityStore, Error, HashEmbedder, JsonFileSource, Pipeline,
        RawRecord, Result, RunContext, RunReport, SearchEngine, SourceCollector, SourceId,
    };
}
