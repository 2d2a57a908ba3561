//! Indexing job controller.
//!
//! Orchestrates a full catalog refresh: fetch the archive snapshot, parse
//! every registry document, upsert the store, and record the outcome in the
//! run history. At most one run is active at a time, enforced by a durable
//! compare-and-swap on the singleton state row.

pub mod service;

#[cfg(test)]
pub mod test_utils;

pub use service::{
    CatalogIndexer, IndexStatusView, IndexerConfig, IndexerConfigBuilder, StopReport,
    TriggerOutcome,
};
