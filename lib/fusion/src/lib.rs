//! # DishX Fusion
//!
//! Turns a [`MatchCluster`](dishx_core::MatchCluster) into one
//! [`CanonicalEntity`](dishx_core::CanonicalEntity) with per-field
//! provenance, a stable id, and conflict reports for fields the sources
//! disagree on.

pub mod fuser;
pub mod identity;
pub mod merge;

pub use fuser::Fuser;
pub use identity::{cluster_id, stable_id, ID_PREFIX};
pub use merge::merge_with_stored;
