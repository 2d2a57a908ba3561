use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Sqlite;

use crate::catalog::RepoInfo;
use crate::db::DbConnection;
use crate::errors::Result;
use crate::types::StarCount;

/// One persisted repository row, unique by (owner, name).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RepositoryDto {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub stars: i64,
    pub language: Option<String>,
    pub last_commit: Option<DateTime<Utc>>,
    pub archived: bool,
    pub description: Option<String>,
}

/// Insert-or-update a repository by its (owner, name) key, returning the row
/// id. Later observations overwrite stars, language, last commit, archived
/// flag and description.
pub async fn upsert_repository_query(
    db_tx: &mut sqlx::Transaction<'_, Sqlite>,
    repo: &RepoInfo,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO repositories (owner, name, stars, language, last_commit, archived, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (owner, name)
        DO UPDATE SET
            stars = EXCLUDED.stars,
            language = EXCLUDED.language,
            last_commit = EXCLUDED.last_commit,
            archived = EXCLUDED.archived,
            description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(&repo.owner)
    .bind(&repo.name)
    .bind(StarCount::clamped(repo.stars).value())
    .bind(&repo.language)
    .bind(repo.last_commit)
    .bind(repo.archived)
    .bind(&repo.description)
    .fetch_one(&mut **db_tx)
    .await?;

    Ok(id)
}

/// Looks up one repository by its key. Unknown keys are `Ok(None)`.
pub async fn get_repository(
    db: &DbConnection,
    owner: &str,
    name: &str,
) -> Result<Option<RepositoryDto>> {
    let result = sqlx::query_as::<_, RepositoryDto>(
        r#"
        SELECT id, owner, name, stars, language, last_commit, archived, description
        FROM repositories
        WHERE owner = $1 AND name = $2
        "#,
    )
    .bind(owner)
    .bind(name)
    .fetch_optional(&db.pool)
    .await?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner: &str, name: &str, stars: i64) -> RepoInfo {
        RepoInfo {
            owner: owner.to_string(),
            name: name.to_string(),
            stars,
            language: Some("Go".to_string()),
            last_commit: None,
            archived: false,
            description: Some("a test repo".to_string()),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_overwrites() {
        let db = DbConnection::new_in_memory().await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        let first_id = upsert_repository_query(&mut tx, &repo("gin-gonic", "gin", 100))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        let second_id = upsert_repository_query(&mut tx, &repo("gin-gonic", "gin", 50000))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Same key, same row.
        assert_eq!(first_id, second_id);

        let stored = get_repository(&db, "gin-gonic", "gin").await.unwrap().unwrap();
        assert_eq!(stored.stars, 50000);
        assert_eq!(stored.language.as_deref(), Some("Go"));
    }

    #[tokio::test]
    async fn negative_stars_are_clamped_to_zero() {
        let db = DbConnection::new_in_memory().await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        upsert_repository_query(&mut tx, &repo("a", "b", -7)).await.unwrap();
        tx.commit().await.unwrap();

        let stored = get_repository(&db, "a", "b").await.unwrap().unwrap();
        assert_eq!(stored.stars, 0);
    }

    #[tokio::test]
    async fn unknown_repository_is_none() {
        let db = DbConnection::new_in_memory().await.unwrap();
        assert!(get_repository(&db, "no", "body").await.unwrap().is_none());
    }
}
