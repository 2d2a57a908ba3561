//! Search query engine.
//!
//! Evaluates multi-predicate filters against the persisted catalog with
//! stable sort orders and keyset pagination. Read-only: a concurrent
//! indexing run never blocks queries, which see whatever consistent
//! snapshot the storage engine exposes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::db::DbConnection;
use crate::errors::{CatalogError, Result};
use crate::repositories::registry_metadata::{list_registry_metadata, RegistryMetadataDto};
use crate::types::CategoryKey;

/// Free-text queries longer than this are rejected outright rather than
/// silently truncated.
pub const MAX_QUERY_LEN: usize = 1000;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

/// Sort orders over the catalog. Every order carries a membership-id
/// ascending tiebreak so pagination cursors resume deterministically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Stars, descending. The default.
    #[default]
    Stars,
    /// Title, ascending, case-sensitive collation.
    Name,
    /// Last commit, descending, repositories without one last.
    Updated,
}

/// One search request. All filters are optional and ANDed together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    /// Exact registry short name.
    pub registry: Option<String>,
    /// Category scoped to its registry (`registry::category`).
    pub category: Option<CategoryKey>,
    /// Exact language match.
    pub language: Option<String>,
    /// Inclusive star lower bound; negative input is clamped to zero.
    pub min_stars: Option<i64>,
    /// Tri-state archived filter. Omission excludes archived entries.
    pub archived: Option<bool>,
    /// Case-insensitive substring over title OR description. LIKE
    /// metacharacters match only literally.
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortField,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub cursor: Option<String>,
}

/// One catalog entry as returned by search: the membership plus its
/// repository, when it has one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SearchHit {
    pub id: i64,
    pub registry_name: String,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub name: Option<String>,
    pub stars: i64,
    pub language: Option<String>,
    pub last_commit: Option<DateTime<Utc>>,
    pub archived: bool,
}

/// One page of results plus the continuation cursor.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub data: Vec<SearchHit>,
    /// Full filtered count, independent of the page limit.
    pub total: i64,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// The canonical pagination cursor: the last row's sort key plus its id
/// tiebreaker, serialized as an opaque JSON token. Offset requests are
/// translated into this representation so both public pagination shapes
/// share one scan path.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cursor {
    sort: SortField,
    #[serde(flatten)]
    key: CursorKey,
    id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "k", content = "v", rename_all = "snake_case")]
enum CursorKey {
    Stars(i64),
    Name(String),
    Updated(Option<DateTime<Utc>>),
}

impl Cursor {
    fn from_hit(sort: SortField, hit: &SearchHit) -> Self {
        let key = match sort {
            SortField::Stars => CursorKey::Stars(hit.stars),
            SortField::Name => CursorKey::Name(hit.title.clone()),
            SortField::Updated => CursorKey::Updated(hit.last_commit),
        };
        Self {
            sort,
            key,
            id: hit.id,
        }
    }

    fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CatalogError::internal(format!("Failed to serialize cursor: {e}")))
    }

    fn decode(token: &str, expected_sort: SortField) -> Result<Self> {
        let cursor: Self = serde_json::from_str(token)
            .map_err(|e| CatalogError::invalid_cursor(format!("{e}")))?;
        if cursor.sort != expected_sort {
            return Err(CatalogError::invalid_cursor(
                "Cursor was issued for a different sort order",
            ));
        }
        Ok(cursor)
    }
}

/// Escapes LIKE metacharacters so they match only their literal appearance.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read-only query engine over the repository store.
pub struct SearchEngine {
    db: Arc<DbConnection>,
}

impl SearchEngine {
    pub const fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    /// Evaluates one search request.
    ///
    /// Either fully succeeds or rejects outright; an empty result set is a
    /// valid, non-error outcome.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage> {
        if let Some(q) = &params.q {
            if q.len() > MAX_QUERY_LEN {
                return Err(CatalogError::query_too_complex(q.len(), MAX_QUERY_LEN));
            }
        }
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        if limit == 0 {
            return Err(CatalogError::configuration(
                "limit",
                "Page limit must be greater than zero",
            ));
        }
        if params.cursor.is_some() && params.offset.is_some() {
            return Err(CatalogError::configuration(
                "pagination",
                "Provide either a cursor or an offset, not both",
            ));
        }

        let total = self.count(params).await?;

        // Both pagination shapes resolve to one canonical cursor.
        let cursor = match (&params.cursor, params.offset) {
            (Some(token), _) => Some(Cursor::decode(token, params.sort)?),
            (None, Some(0) | None) => None,
            (None, Some(offset)) => match self.cursor_at_offset(params, offset).await? {
                Some(cursor) => Some(cursor),
                // Offset past the end of the filtered set.
                None => {
                    return Ok(SearchPage {
                        data: Vec::new(),
                        total,
                        has_more: false,
                        next_cursor: None,
                    });
                }
            },
        };

        // Fetch one row past the page to learn whether more remain.
        let mut rows = self.page(params, cursor.as_ref(), i64::from(limit) + 1).await?;
        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);

        let next_cursor = if has_more {
            match rows.last() {
                Some(last) => Some(Cursor::from_hit(params.sort, last).encode()?),
                None => None,
            }
        } else {
            None
        };

        Ok(SearchPage {
            data: rows,
            total,
            has_more,
            next_cursor,
        })
    }

    /// Distinct languages across the catalog, optionally scoped to one
    /// registry, alphabetically.
    pub async fn list_languages(&self, registry: Option<&str>) -> Result<Vec<String>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT DISTINCT r.language
            FROM registry_memberships m
            JOIN repositories r ON r.id = m.repository_id
            WHERE r.language IS NOT NULL
            "#,
        );
        if let Some(registry) = registry {
            qb.push(" AND m.registry_name = ").push_bind(registry);
        }
        qb.push(" ORDER BY r.language ASC");

        let languages = qb.build_query_scalar().fetch_all(&self.db.pool).await?;
        Ok(languages)
    }

    /// Distinct categories as `registry::category` composite keys,
    /// optionally scoped to one registry.
    pub async fn list_categories(&self, registry: Option<&str>) -> Result<Vec<CategoryKey>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT registry_name, category FROM registry_memberships WHERE 1 = 1",
        );
        if let Some(registry) = registry {
            qb.push(" AND registry_name = ").push_bind(registry);
        }
        qb.push(" ORDER BY registry_name ASC, category ASC");

        let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.db.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(registry, category)| {
                CategoryKey::new(crate::types::RegistryName::from_short(registry), category)
            })
            .collect())
    }

    /// Per-registry metadata for all registries.
    pub async fn get_metadata(&self) -> Result<Vec<RegistryMetadataDto>> {
        list_registry_metadata(&self.db).await
    }

    async fn count(&self, params: &SearchParams) -> Result<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT COUNT(*)
            FROM registry_memberships m
            LEFT JOIN repositories r ON r.id = m.repository_id
            WHERE 1 = 1
            "#,
        );
        push_filters(&mut qb, params);

        let total = qb.build_query_scalar().fetch_one(&self.db.pool).await?;
        Ok(total)
    }

    /// Translates an offset into the equivalent cursor by reading the sort
    /// key of the row just before the requested position. `None` when the
    /// offset is past the end.
    async fn cursor_at_offset(&self, params: &SearchParams, offset: u32) -> Result<Option<Cursor>> {
        let mut qb = select_hits();
        push_filters(&mut qb, params);
        push_order(&mut qb, params.sort);
        qb.push(" LIMIT 1 OFFSET ").push_bind(i64::from(offset) - 1);

        let boundary: Option<SearchHit> =
            qb.build_query_as().fetch_optional(&self.db.pool).await?;
        Ok(boundary.map(|hit| Cursor::from_hit(params.sort, &hit)))
    }

    async fn page(
        &self,
        params: &SearchParams,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let mut qb = select_hits();
        push_filters(&mut qb, params);
        if let Some(cursor) = cursor {
            push_cursor_predicate(&mut qb, cursor);
        }
        push_order(&mut qb, params.sort);
        qb.push(" LIMIT ").push_bind(limit);

        let rows = qb.build_query_as().fetch_all(&self.db.pool).await?;
        Ok(rows)
    }
}

fn select_hits() -> QueryBuilder<'static, Sqlite> {
    QueryBuilder::new(
        r#"
        SELECT
            m.id,
            m.registry_name,
            m.category,
            m.title,
            m.description,
            r.owner,
            r.name,
            COALESCE(r.stars, 0) AS stars,
            r.language,
            r.last_commit,
            COALESCE(r.archived, 0) AS archived
        FROM registry_memberships m
        LEFT JOIN repositories r ON r.id = m.repository_id
        WHERE 1 = 1
        "#,
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &SearchParams) {
    if let Some(registry) = &params.registry {
        qb.push(" AND m.registry_name = ").push_bind(registry.clone());
    }
    if let Some(category) = &params.category {
        qb.push(" AND m.registry_name = ")
            .push_bind(category.registry.as_str().to_string())
            .push(" AND m.category = ")
            .push_bind(category.category.clone());
    }
    if let Some(language) = &params.language {
        qb.push(" AND r.language = ").push_bind(language.clone());
    }
    if let Some(min_stars) = params.min_stars {
        // Negative bounds clamp to zero, the identity filter.
        qb.push(" AND COALESCE(r.stars, 0) >= ").push_bind(min_stars.max(0));
    }
    match params.archived {
        // The deliberate default: archived entries are excluded unless
        // asked for. Entries without a repository are never archived.
        None => {
            qb.push(" AND COALESCE(r.archived, 0) = 0");
        }
        Some(archived) => {
            qb.push(" AND COALESCE(r.archived, 0) = ").push_bind(archived);
        }
    }
    if let Some(q) = &params.q {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (m.title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR m.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: SortField) {
    match sort {
        SortField::Stars => {
            qb.push(" ORDER BY COALESCE(r.stars, 0) DESC, m.id ASC");
        }
        SortField::Name => {
            qb.push(" ORDER BY m.title ASC, m.id ASC");
        }
        SortField::Updated => {
            qb.push(" ORDER BY (r.last_commit IS NULL) ASC, r.last_commit DESC, m.id ASC");
        }
    }
}

/// Keyset resume predicate: strictly after the cursor row in the sort
/// order, id-ascending within equal keys. Rows inserted between fetches can
/// therefore never duplicate or displace already-returned rows.
fn push_cursor_predicate(qb: &mut QueryBuilder<'_, Sqlite>, cursor: &Cursor) {
    match &cursor.key {
        CursorKey::Stars(stars) => {
            qb.push(" AND (COALESCE(r.stars, 0) < ")
                .push_bind(*stars)
                .push(" OR (COALESCE(r.stars, 0) = ")
                .push_bind(*stars)
                .push(" AND m.id > ")
                .push_bind(cursor.id)
                .push("))");
        }
        CursorKey::Name(title) => {
            qb.push(" AND (m.title > ")
                .push_bind(title.clone())
                .push(" OR (m.title = ")
                .push_bind(title.clone())
                .push(" AND m.id > ")
                .push_bind(cursor.id)
                .push("))");
        }
        CursorKey::Updated(Some(ts)) => {
            qb.push(" AND (r.last_commit IS NULL OR r.last_commit < ")
                .push_bind(*ts)
                .push(" OR (r.last_commit = ")
                .push_bind(*ts)
                .push(" AND m.id > ")
                .push_bind(cursor.id)
                .push("))");
        }
        CursorKey::Updated(None) => {
            qb.push(" AND (r.last_commit IS NULL AND m.id > ")
                .push_bind(cursor.id)
                .push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RepoInfo;
    use crate::repositories::membership::{replace_registry_memberships_query, NewMembership};
    use crate::repositories::repository::upsert_repository_query;
    use crate::types::RegistryName;

    struct Seed {
        registry: &'static str,
        category: &'static str,
        title: &'static str,
        description: &'static str,
        repo: Option<RepoInfo>,
    }

    fn repo(
        owner: &str,
        name: &str,
        stars: i64,
        language: &str,
        archived: bool,
        last_commit: Option<&str>,
        description: &str,
    ) -> RepoInfo {
        RepoInfo {
            owner: owner.to_string(),
            name: name.to_string(),
            stars,
            language: Some(language.to_string()),
            last_commit: last_commit.map(|s| s.parse().unwrap()),
            archived,
            description: Some(description.to_string()),
        }
    }

    /// The five-repository scenario: Gin, Echo, Testify under "go";
    /// Django and archived Flask under "python".
    async fn seed_scenario(db: &DbConnection) {
        let seeds = vec![
            Seed {
                registry: "go",
                category: "Web Frameworks",
                title: "Gin",
                description: "HTTP web framework",
                repo: Some(repo(
                    "gin-gonic",
                    "gin",
                    50000,
                    "Go",
                    false,
                    Some("2025-05-01T00:00:00Z"),
                    "HTTP web framework",
                )),
            },
            Seed {
                registry: "go",
                category: "Web Frameworks",
                title: "Echo",
                description: "High performance minimalist Go web server",
                repo: Some(repo(
                    "labstack",
                    "echo",
                    8000,
                    "Go",
                    false,
                    Some("2025-03-10T00:00:00Z"),
                    "High performance minimalist Go web server",
                )),
            },
            Seed {
                registry: "go",
                category: "Testing",
                title: "Testify",
                description: "Toolkit with common assertions and mocks",
                repo: Some(repo(
                    "stretchr",
                    "testify",
                    2000,
                    "Go",
                    false,
                    None,
                    "Toolkit with common assertions and mocks",
                )),
            },
            Seed {
                registry: "python",
                category: "Web Frameworks",
                title: "Django",
                description: "The web framework for perfectionists",
                repo: Some(repo(
                    "django",
                    "django",
                    20000,
                    "Python",
                    false,
                    Some("2025-04-20T00:00:00Z"),
                    "The web framework for perfectionists",
                )),
            },
            Seed {
                registry: "python",
                category: "Web Frameworks",
                title: "Flask",
                description: "Lightweight WSGI web application framework",
                repo: Some(repo(
                    "pallets",
                    "flask",
                    10000,
                    "Python",
                    true,
                    Some("2025-01-01T00:00:00Z"),
                    "Lightweight WSGI web application framework",
                )),
            },
        ];

        let mut by_registry: std::collections::BTreeMap<&str, Vec<NewMembership>> =
            std::collections::BTreeMap::new();

        let mut tx = db.pool.begin().await.unwrap();
        for seed in &seeds {
            let repository_id = match &seed.repo {
                Some(info) => Some(upsert_repository_query(&mut tx, info).await.unwrap()),
                None => None,
            };
            let entries = by_registry.entry(seed.registry).or_default();
            entries.push(NewMembership {
                category: seed.category.to_string(),
                position: entries.len() as i64,
                title: seed.title.to_string(),
                description: Some(seed.description.to_string()),
                repository_id,
            });
        }
        for (registry, memberships) in by_registry {
            replace_registry_memberships_query(
                &mut tx,
                &RegistryName::from_short(registry),
                &memberships,
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();
    }

    async fn engine() -> (Arc<DbConnection>, SearchEngine) {
        let db = DbConnection::new_in_memory().await.unwrap();
        seed_scenario(&db).await;
        let engine = SearchEngine::new(Arc::clone(&db));
        (db, engine)
    }

    fn titles(page: &SearchPage) -> Vec<&str> {
        page.data.iter().map(|hit| hit.title.as_str()).collect()
    }

    #[tokio::test]
    async fn default_search_excludes_archived_and_sorts_by_stars() {
        let (_db, engine) = engine().await;

        let page = engine.search(&SearchParams::default()).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(titles(&page), vec!["Gin", "Django", "Echo", "Testify"]);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn archived_true_returns_only_archived() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                archived: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&page), vec!["Flask"]);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn registry_and_min_stars_combine() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                registry: Some("go".to_string()),
                min_stars: Some(5000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&page), vec!["Gin", "Echo"]);
    }

    #[tokio::test]
    async fn negative_min_stars_is_clamped_to_zero() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                min_stars: Some(-100),
                ..Default::default()
            })
            .await
            .unwrap();
        // Identity filter: same as no bound at all.
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn free_text_is_case_insensitive_and_respects_archived_default() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                q: Some("FRAMEWORK".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        // Flask's description matches but it is archived.
        assert_eq!(titles(&page), vec!["Gin", "Django"]);
    }

    #[tokio::test]
    async fn category_filter_is_scoped_to_its_registry() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                category: Some("go::Testing".parse().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&page), vec!["Testify"]);

        // Same category name under a different registry: empty, not error.
        let page = engine
            .search(&SearchParams {
                category: Some("python::Testing".parse().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn like_metacharacters_match_only_literally() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let mut tx = db.pool.begin().await.unwrap();
        replace_registry_memberships_query(
            &mut tx,
            &RegistryName::from_short("misc"),
            &[
                NewMembership {
                    category: "Tools".into(),
                    position: 0,
                    title: "100% coverage".into(),
                    description: None,
                    repository_id: None,
                },
                NewMembership {
                    category: "Tools".into(),
                    position: 1,
                    title: "completely unrelated".into(),
                    description: None,
                    repository_id: None,
                },
            ],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let engine = SearchEngine::new(Arc::clone(&db));
        let page = engine
            .search(&SearchParams {
                q: Some("100%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        // '%' must not act as a wildcard: only the literal match returns.
        assert_eq!(titles(&page), vec!["100% coverage"]);
    }

    #[tokio::test]
    async fn overlong_query_is_rejected_not_truncated() {
        let (_db, engine) = engine().await;

        let err = engine
            .search(&SearchParams {
                q: Some("x".repeat(MAX_QUERY_LEN + 1)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::QueryTooComplex { .. }));
    }

    #[tokio::test]
    async fn name_sort_is_case_sensitive_ascending() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                sort: SortField::Name,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&page), vec!["Django", "Echo", "Gin", "Testify"]);
    }

    #[tokio::test]
    async fn updated_sort_puts_missing_timestamps_last() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                sort: SortField::Updated,
                ..Default::default()
            })
            .await
            .unwrap();
        // Testify has no last_commit and sorts last.
        assert_eq!(titles(&page), vec!["Gin", "Django", "Echo", "Testify"]);
    }

    #[tokio::test]
    async fn cursor_pagination_covers_every_row_exactly_once() {
        let (_db, engine) = engine().await;

        let base = SearchParams {
            archived: Some(false),
            limit: Some(2),
            ..Default::default()
        };

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = engine
                .search(&SearchParams {
                    cursor: cursor.clone(),
                    ..base.clone()
                })
                .await
                .unwrap();
            assert_eq!(page.total, 4);
            seen.extend(page.data.iter().map(|hit| hit.title.clone()));
            pages += 1;
            match page.next_cursor {
                Some(next) => {
                    assert!(page.has_more);
                    cursor = Some(next);
                }
                None => break,
            }
        }

        assert_eq!(pages, 2);
        assert_eq!(seen, vec!["Gin", "Django", "Echo", "Testify"]);
    }

    #[tokio::test]
    async fn offset_pagination_agrees_with_cursor_pagination() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                limit: Some(2),
                offset: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&page), vec!["Echo", "Testify"]);
        assert_eq!(page.total, 4);
        // offset(2) + len(2) == total(4): nothing further.
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn out_of_range_offset_yields_empty_page() {
        let (_db, engine) = engine().await;

        let page = engine
            .search(&SearchParams {
                offset: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 4);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn out_of_range_cursor_yields_empty_page() {
        let (_db, engine) = engine().await;

        // A cursor strictly below every row's sort key.
        let cursor = Cursor {
            sort: SortField::Stars,
            key: CursorKey::Stars(0),
            id: i64::MAX,
        };
        let page = engine
            .search(&SearchParams {
                cursor: Some(cursor.encode().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn garbage_cursor_is_rejected() {
        let (_db, engine) = engine().await;

        let err = engine
            .search(&SearchParams {
                cursor: Some("not a cursor".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCursor { .. }));

        // A cursor from a different sort order is also rejected.
        let stars_cursor = Cursor {
            sort: SortField::Stars,
            key: CursorKey::Stars(10),
            id: 1,
        };
        let err = engine
            .search(&SearchParams {
                sort: SortField::Name,
                cursor: Some(stars_cursor.encode().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCursor { .. }));
    }

    #[tokio::test]
    async fn rows_inserted_between_pages_never_duplicate_results() {
        let (db, engine) = engine().await;

        let first = engine
            .search(&SearchParams {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(titles(&first), vec!["Gin", "Django"]);

        // A new top-starred repository lands between fetches.
        let mut tx = db.pool.begin().await.unwrap();
        let id = upsert_repository_query(
            &mut tx,
            &repo("torvalds", "linux", 150000, "C", false, None, "The kernel"),
        )
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO registry_memberships
             (registry_name, category, position, title, description, repository_id)
             VALUES ('c', 'Kernels', 0, 'Linux', NULL, $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let second = engine
            .search(&SearchParams {
                limit: Some(2),
                cursor: first.next_cursor.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        // The insert sorts before the cursor position, so the scan neither
        // repeats Gin/Django nor skips the remaining rows.
        assert_eq!(titles(&second), vec!["Echo", "Testify"]);
    }

    #[tokio::test]
    async fn aggregate_views_scope_by_registry() {
        let (_db, engine) = engine().await;

        let all = engine.list_languages(None).await.unwrap();
        assert_eq!(all, vec!["Go".to_string(), "Python".to_string()]);

        let go_only = engine.list_languages(Some("go")).await.unwrap();
        assert_eq!(go_only, vec!["Go".to_string()]);

        let categories = engine.list_categories(Some("go")).await.unwrap();
        let rendered: Vec<String> = categories.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["go::Testing".to_string(), "go::Web Frameworks".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_store_searches_cleanly() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let engine = SearchEngine::new(db);

        let page = engine.search(&SearchParams::default()).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
        assert!(engine.list_languages(None).await.unwrap().is_empty());
        assert!(engine.get_metadata().await.unwrap().is_empty());
    }
}
