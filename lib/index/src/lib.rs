//! # DishX Index
//!
//! Summary embeddings and semantic search for canonical entities.
//!
//! - [`Indexer`] derives a summary text per entity, embeds it through an
//!   [`EmbeddingProvider`] and publishes a fresh [`IndexSnapshot`] once the
//!   whole pass is done
//! - [`SearchEngine`] embeds a query with the same provider and ranks the
//!   snapshot by cosine similarity, optionally restricted to a neighborhood
//!   found in the query text
//!
//! ```rust
//! use dishx_core::{CanonicalEntity, RunContext, SourceId};
//! use dishx_index::{HashEmbedder, IndexConfig, Indexer, SearchConfig, SearchEngine, VectorIndex};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let provider = Arc::new(HashEmbedder::default());
//! let index = Arc::new(VectorIndex::new());
//! let indexer = Indexer::new(provider.clone(), index.clone(), IndexConfig::default());
//!
//! let mut entities = vec![CanonicalEntity::new("rst_1", "Joe's Pizza", SourceId::Google, chrono::Utc::now())];
//! indexer.index_all(&RunContext::new(), &mut entities).await;
//!
//! let engine = SearchEngine::new(provider, index, SearchConfig::default()).unwrap();
//! let hits = engine.search("pizza", None).await.unwrap();
//! assert_eq!(hits[0].entity.id, "rst_1");
//! # });
//! ```

pub mod collection;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod location;
pub mod openai;
pub mod search;
pub mod summary;

pub use collection::{IndexEntry, IndexSnapshot, VectorIndex};
pub use embedder::{EmbeddingProvider, HashEmbedder};
pub use error::EmbeddingError;
pub use indexer::{EmbedStatus, IndexConfig, IndexOutcome, Indexer};
pub use location::LocationExtractor;
pub use openai::OpenAiEmbedder;
pub use search::{LocatedSearch, SearchConfig, SearchEngine, SearchHit};
pub use summary::{summary_hash, summary_text, SummaryConfig};
