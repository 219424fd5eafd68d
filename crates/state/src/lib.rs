//! `state` crate — the two-tier (fast cache / durable store) state manager
//! described in spec.md §4.2.
//!
//! Grounded on `original_source/state_manager.py`'s `StateManager`: the
//! Redis tier there becomes [`cache::Cache`], an in-process concurrent map;
//! the PostgreSQL tier becomes the `db` crate's repository functions,
//! reached through [`store::StateStore`].

pub mod cache;
pub mod error;
pub mod models;
pub mod store;

pub use error::StateError;
pub use models::{StateKey, StateScope, WorkflowStateView};
pub use store::StateStore;
