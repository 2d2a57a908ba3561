//! Catalog document model.
//!
//! One registry's snapshot is a nested document: sections of catalog items,
//! items optionally carrying children and a reference to an open-source
//! repository. This module parses that loosely-shaped JSON into closed types
//! and flattens it into the ordered `(category, item)` sequence the store
//! persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CatalogError, Result};
use crate::types::StarCount;

/// One registry document as shipped in the archive snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub items: Vec<Section>,
}

/// Descriptive header of a registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Source reference of the registry, usually `owner/enhansome-<suffix>`.
    pub source: Option<String>,
}

/// A named grouping of catalog items within one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// One entry of a section. Children remain subordinate metadata and are
/// never flattened into independent catalog entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<CatalogItem>,
    pub repo_info: Option<RepoInfo>,
}

/// Reference to the open-source repository backing a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub stars: i64,
    pub language: Option<String>,
    pub last_commit: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    pub description: Option<String>,
}

/// A flattened catalog entry: the section title it came from plus the item.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub category: String,
    pub item: CatalogItem,
}

/// Result of flattening one registry document.
#[derive(Debug, Clone)]
pub struct FlattenedCatalog {
    pub entries: Vec<CatalogEntry>,
    pub total_stars: StarCount,
}

/// Parses a raw snapshot value into a validated registry document.
///
/// Non-conforming documents are a per-registry parse error, recorded by the
/// indexing run rather than crashing it.
pub fn parse_document(registry: &str, raw: Value) -> Result<RegistryDocument> {
    serde_json::from_value(raw)
        .map_err(|e| CatalogError::registry_parse(registry, format!("{e}")))
}

/// Flattens a registry document into catalog entries, preserving document
/// order, plus the aggregate star total.
///
/// Only first-level items of each section become entries; an empty section
/// contributes nothing. Items without a repository reference are still
/// emitted and contribute zero stars.
#[must_use]
pub fn flatten(document: &RegistryDocument) -> FlattenedCatalog {
    let mut entries = Vec::new();
    let mut total_stars: i64 = 0;

    for section in &document.items {
        for item in &section.items {
            if let Some(repo) = &item.repo_info {
                total_stars += repo.stars.max(0);
            }
            entries.push(CatalogEntry {
                category: section.title.clone(),
                item: item.clone(),
            });
        }
    }

    FlattenedCatalog {
        entries,
        total_stars: StarCount::clamped(total_stars),
    }
}
