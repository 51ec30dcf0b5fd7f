//! # DishX Core
//!
//! Core library for the DishX restaurant resolution pipeline.
//!
//! This crate provides the data model shared by every stage:
//!
//! - [`RawRecord`] - A record as produced by one source collaborator
//! - [`NormalizedRecord`] - A raw record plus its canonicalized fields
//! - [`MatchCluster`] - Records believed to describe one restaurant
//! - [`CanonicalEntity`] - The fused, deduplicated restaurant with provenance
//! - [`Vector`] - Dense embedding vector with cosine similarity
//! - [`RunContext`] / [`RunReport`] - Run-scoped state and the structured report
//!
//! ## Example
//!
//! ```rust
//! use dishx_core::{RawRecord, SourceId, RunContext};
//! use chrono::Utc;
//!
//! let record = RawRecord::new(SourceId::Google, "g-1", "Joe's Pizza", "7 Carmine St, New York", Utc::now())
//!     .with_coordinates(40.7306, -74.0021)
//!     .with_price_range("$");
//! assert_eq!(record.key(), "google:g-1");
//!
//! let ctx = RunContext::new();
//! assert!(ctx.report().issues.is_empty());
//! ```

pub mod cluster;
pub mod context;
pub mod entity;
pub mod error;
pub mod normalized;
pub mod record;
pub mod report;
pub mod vector;

pub use cluster::MatchCluster;
pub use context::RunContext;
pub use entity::{CanonicalEntity, Field, Review, SourceRef};
pub use error::{Error, Result};
pub use normalized::{NormalizedRecord, ParseField, ParseWarning, ParsedAddress};
pub use record::{Coordinates, RawRecord, ReviewSnippet, SourceId};
pub use report::{ConflictReport, RunCounts, RunIssue, RunReport};
pub use vector::Vector;
