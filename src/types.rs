use crate::errors::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical short name of a registry.
///
/// Archive snapshots identify registries by their source repository, either
/// as `owner/enhansome-<suffix>` or as a bare `enhansome-<suffix>`. The short
/// name is the `<suffix>`; identifiers that do not follow that convention
/// pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryName(String);

impl RegistryName {
    /// Normalizes a raw archive identifier into a short registry name.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let tail = raw.rsplit('/').next().unwrap_or(raw);
        let short = tail.strip_prefix("enhansome-").unwrap_or(raw);
        Self(short.to_string())
    }

    /// Wraps an already-normalized short name.
    #[must_use]
    pub fn from_short(short: impl Into<String>) -> Self {
        Self(short.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RegistryName> for String {
    fn from(name: RegistryName) -> Self {
        name.0
    }
}

/// A repository star count with validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StarCount(i64);

impl StarCount {
    /// Creates a new `StarCount`, rejecting negative values.
    pub fn new(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(CatalogError::configuration(
                "stars",
                format!("Star count cannot be negative: {value}"),
            ));
        }
        Ok(Self(value))
    }

    /// Creates a `StarCount`, clamping negative input to zero.
    #[must_use]
    pub const fn clamped(value: i64) -> Self {
        if value < 0 {
            Self(0)
        } else {
            Self(value)
        }
    }

    /// Gets the inner value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StarCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<StarCount> for i64 {
    fn from(stars: StarCount) -> Self {
        stars.0
    }
}

/// The unique key of a repository: its owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub owner: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            return Err(CatalogError::configuration(
                "repo_key",
                "Repository owner and name must be non-empty",
            ));
        }
        Ok(Self { owner, name })
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(CatalogError::configuration(
                "repo_key",
                format!("Expected 'owner/name', got '{s}'"),
            )),
        }
    }
}

/// Composite key scoping a category to one registry, rendered as
/// `registry::category`. Serializes as that rendered string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryKey {
    pub registry: RegistryName,
    pub category: String,
}

impl Serialize for CategoryKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CategoryKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl CategoryKey {
    #[must_use]
    pub fn new(registry: RegistryName, category: impl Into<String>) -> Self {
        Self {
            registry,
            category: category.into(),
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.registry, self.category)
    }
}

impl FromStr for CategoryKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once("::") {
            Some((registry, category)) if !registry.is_empty() && !category.is_empty() => {
                Ok(Self::new(RegistryName::from_short(registry), category))
            }
            _ => Err(CatalogError::configuration(
                "category_key",
                format!("Expected 'registry::category', got '{s}'"),
            )),
        }
    }
}

/// What caused an indexing run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduled,
}

impl TriggerSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TriggerSource {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(CatalogError::configuration(
                "trigger_source",
                format!("Unknown trigger source '{other}'"),
            )),
        }
    }
}

/// Lifecycle of an indexing run, both per-row and in the singleton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CatalogError::internal(format!(
                "Unknown run status '{other}' in store"
            ))),
        }
    }
}
