//! Data access layer for the catalog store.
//!
//! Query functions follow a naming convention: `*_query` functions take a
//! `&mut sqlx::Transaction` and compose into the caller's transaction;
//! everything else borrows the connection and manages its own scope.

pub mod indexing_run;
pub mod membership;
pub mod registry_metadata;
pub mod repository;
