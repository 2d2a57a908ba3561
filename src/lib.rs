//! # Enhansome Catalog DB
//!
//! An indexer and search service for curated "awesome list" registries.
//! It fetches a compressed archive of registry documents, flattens their
//! nested sections into a relational catalog of repositories, and exposes
//! a filterable, sortable, paginated search over the result.
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules with clear boundaries:
//!
//! ### Public API Modules
//! - [`errors`] - Domain-specific error types for catalog operations
//! - [`indexer`] - The indexing job controller (trigger/stop/status/history)
//! - [`search`] - The read-side query engine (filters, sorts, cursors)
//! - [`types`] - Type-safe domain models (`RegistryName`, `CategoryKey`, etc.)
//!
//! ### Internal Modules (Implementation Details)
//! - `archive` - Archive snapshot fetching and decompression
//! - `catalog` - Registry document parsing and flattening
//! - `db` - Database connection management and migrations
//! - `repositories` - Database query abstractions and data access layer
//! - `router` - HTTP endpoints and routing
//!
//! ## Module Interaction Patterns
//!
//! The write path flows `archive -> catalog -> repositories` under the
//! control of [`indexer`]; the read path flows `search -> repositories`.
//! Both sides share `db` and never import from `router`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// Core public modules
pub mod errors;
pub mod indexer;
pub mod search;
pub mod types;

// Internal modules (not part of public API)
pub mod archive;
pub mod catalog;
pub mod db;
pub mod repositories;
pub mod router;

// Public re-exports for simplified API
pub use errors::{CatalogError, Result};
pub use types::{CategoryKey, RegistryName, RepoKey, RunStatus, StarCount, TriggerSource};

// Facade modules for complex subsystems
pub mod database {
    //! Database operations facade
    //!
    //! This module provides a simplified interface to database operations,
    //! hiding the internal complexity of connection management and repositories.

    pub use crate::db::{check_db_connection, DbConnection, DB_MAX_CONNECTIONS};
}

pub mod catalog_api {
    //! Indexing and search facade
    //!
    //! One import surface for embedding the service: the job controller,
    //! the query engine, and the archive client they are wired to.

    pub use crate::archive::{ArchiveProvider, ArchiveSnapshot, HttpArchiveClient};
    pub use crate::indexer::{CatalogIndexer, IndexerConfig, IndexerConfigBuilder};
    pub use crate::search::{SearchEngine, SearchPage, SearchParams, SortField};
}

pub mod health {
    //! Health check and monitoring facade
    //!
    //! This module provides health check endpoints and system monitoring capabilities.

    pub use crate::router::{build_router, initialize_router, AppState};
}
