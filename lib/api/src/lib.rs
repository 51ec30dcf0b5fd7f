//! HTTP surface for DishX: semantic search and canonical entity lookup.

pub mod rest;

pub use rest::{ApiError, AppState, RestApi};
