//! # DishX Matching
//!
//! Normalization and identity matching for restaurant records collected
//! from several sources.
//!
//! ## Stages
//!
//! - **Normalize**: canonical name tokens, parsed address, digits-only phone
//! - **Block**: geo grid cells with locality and name-prefix fallbacks
//! - **Score**: weighted name/address similarity with a phone override and
//!   a street-number veto
//! - **Cluster**: strongest-first union-find, at most one record per source
//!
//! ## Example
//!
//! ```rust
//! use dishx_matching::{normalize, MatchConfig, Matcher};
//! use dishx_core::{RawRecord, RunContext, SourceId};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let records = vec![
//!     normalize(RawRecord::new(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York", now)),
//!     normalize(RawRecord::new(SourceId::Resy, "r1", "Joes Pizza", "7 Carmine Street, New York", now)),
//! ];
//!
//! let ctx = RunContext::new();
//! let clusters = Matcher::new(MatchConfig::default()).match_records(&ctx, records);
//! assert_eq!(clusters.len(), 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  RawRecord  │────>│ Normalizer  │────>│   Blocker   │────>│   Scorer    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                                    │
//!                                         ┌─────────────┐            │
//!                                         │   Matcher   │<───────────┘
//!                                         │(union-find) │
//!                                         └─────────────┘
//!                                                │
//!                                         ┌─────────────┐
//!                                         │MatchCluster │
//!                                         └─────────────┘
//! ```

pub mod blocking;
pub mod config;
pub mod distance;
pub mod matcher;
pub mod normalize;
pub mod scorer;

pub use blocking::{BlockKey, Blocker};
pub use config::{ConfigError, MatchConfig};
pub use distance::{edit_ratio, jaccard_tokens, name_similarity, trigram_similarity};
pub use matcher::Matcher;
pub use normalize::{normalize, normalize_all, normalize_name, normalize_phone};
pub use scorer::{PairScore, Scorer};
