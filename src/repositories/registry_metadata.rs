use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Sqlite;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::types::RegistryName;

/// Cached per-registry statistics, recomputed on every successful run.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RegistryMetadataDto {
    pub registry_name: String,
    pub title: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub total_items: i64,
    pub total_stars: i64,
    /// JSON array of distinct languages across this registry's members.
    pub languages: String,
    pub latest_commit: Option<DateTime<Utc>>,
}

impl RegistryMetadataDto {
    /// Decodes the JSON languages column.
    pub fn languages_vec(&self) -> Result<Vec<String>> {
        Ok(serde_json::from_str(&self.languages)?)
    }
}

/// Derives and stores one registry's statistics from its current
/// memberships: total items, total stars, distinct languages, and the most
/// recent commit timestamp.
pub async fn recompute_registry_metadata_query(
    db_tx: &mut sqlx::Transaction<'_, Sqlite>,
    registry: &RegistryName,
    title: &str,
    description: Option<&str>,
    source: Option<&str>,
) -> Result<()> {
    let (total_items, total_stars, latest_commit): (i64, i64, Option<DateTime<Utc>>) =
        sqlx::query_as(
            r#"
            SELECT
                COUNT(m.id),
                COALESCE(SUM(COALESCE(r.stars, 0)), 0),
                MAX(r.last_commit)
            FROM registry_memberships m
            LEFT JOIN repositories r ON r.id = m.repository_id
            WHERE m.registry_name = $1
            "#,
        )
        .bind(registry.as_str())
        .fetch_one(&mut **db_tx)
        .await?;

    let languages: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT r.language
        FROM registry_memberships m
        JOIN repositories r ON r.id = m.repository_id
        WHERE m.registry_name = $1 AND r.language IS NOT NULL
        ORDER BY r.language ASC
        "#,
    )
    .bind(registry.as_str())
    .fetch_all(&mut **db_tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO registry_metadata
            (registry_name, title, description, source, last_refreshed_at,
             total_items, total_stars, languages, latest_commit)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (registry_name)
        DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            source = EXCLUDED.source,
            last_refreshed_at = EXCLUDED.last_refreshed_at,
            total_items = EXCLUDED.total_items,
            total_stars = EXCLUDED.total_stars,
            languages = EXCLUDED.languages,
            latest_commit = EXCLUDED.latest_commit
        "#,
    )
    .bind(registry.as_str())
    .bind(title)
    .bind(description)
    .bind(source)
    .bind(Utc::now())
    .bind(total_items)
    .bind(total_stars)
    .bind(serde_json::to_string(&languages)?)
    .bind(latest_commit)
    .execute(&mut **db_tx)
    .await?;

    Ok(())
}

/// Fetches one registry's metadata. Unknown registries are `Ok(None)`.
pub async fn get_registry_metadata(
    db: &DbConnection,
    registry: &RegistryName,
) -> Result<Option<RegistryMetadataDto>> {
    let result = sqlx::query_as::<_, RegistryMetadataDto>(
        "SELECT * FROM registry_metadata WHERE registry_name = $1",
    )
    .bind(registry.as_str())
    .fetch_optional(&db.pool)
    .await?;

    Ok(result)
}

/// Lists all registries' metadata, alphabetically.
pub async fn list_registry_metadata(db: &DbConnection) -> Result<Vec<RegistryMetadataDto>> {
    let rows = sqlx::query_as::<_, RegistryMetadataDto>(
        "SELECT * FROM registry_metadata ORDER BY registry_name ASC",
    )
    .fetch_all(&db.pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RepoInfo;
    use crate::repositories::membership::{replace_registry_memberships_query, NewMembership};
    use crate::repositories::repository::upsert_repository_query;

    #[tokio::test]
    async fn recompute_derives_totals_languages_and_latest_commit() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let go = RegistryName::from_short("go");

        let older = "2024-01-10T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let newer = "2025-06-01T12:30:00Z".parse::<DateTime<Utc>>().unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        let gin = upsert_repository_query(
            &mut tx,
            &RepoInfo {
                owner: "gin-gonic".into(),
                name: "gin".into(),
                stars: 50000,
                language: Some("Go".into()),
                last_commit: Some(newer),
                archived: false,
                description: None,
            },
        )
        .await
        .unwrap();
        let testify = upsert_repository_query(
            &mut tx,
            &RepoInfo {
                owner: "stretchr".into(),
                name: "testify".into(),
                stars: 2000,
                language: Some("Go".into()),
                last_commit: Some(older),
                archived: false,
                description: None,
            },
        )
        .await
        .unwrap();

        replace_registry_memberships_query(
            &mut tx,
            &go,
            &[
                NewMembership {
                    category: "Web".into(),
                    position: 0,
                    title: "Gin".into(),
                    description: None,
                    repository_id: Some(gin),
                },
                NewMembership {
                    category: "Testing".into(),
                    position: 1,
                    title: "Testify".into(),
                    description: None,
                    repository_id: Some(testify),
                },
                NewMembership {
                    category: "Links".into(),
                    position: 2,
                    title: "A bookmark".into(),
                    description: None,
                    repository_id: None,
                },
            ],
        )
        .await
        .unwrap();

        recompute_registry_metadata_query(&mut tx, &go, "Awesome Go", Some("Go things"), None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let metadata = get_registry_metadata(&db, &go).await.unwrap().unwrap();
        assert_eq!(metadata.total_items, 3);
        assert_eq!(metadata.total_stars, 52000);
        assert_eq!(metadata.languages_vec().unwrap(), vec!["Go".to_string()]);
        assert_eq!(metadata.latest_commit, Some(newer));
        assert!(metadata.last_refreshed_at.is_some());
    }

    #[tokio::test]
    async fn unknown_registry_metadata_is_none() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let missing = RegistryName::from_short("nope");
        assert!(get_registry_metadata(&db, &missing).await.unwrap().is_none());
    }
}
