use serde::Serialize;
use sqlx::Sqlite;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::types::RegistryName;

/// One catalog entry's membership of a registry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MembershipDto {
    pub id: i64,
    pub registry_name: String,
    pub category: String,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub repository_id: Option<i64>,
}

/// A membership to be written. `repository_id` is NULL for catalog items
/// that carry no repository reference.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub category: String,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub repository_id: Option<i64>,
}

/// Atomically swaps the full membership set of one registry.
///
/// Runs inside the caller's transaction: a failure part-way leaves the
/// previous set intact once the transaction rolls back. Memberships of
/// other registries are never touched.
pub async fn replace_registry_memberships_query(
    db_tx: &mut sqlx::Transaction<'_, Sqlite>,
    registry: &RegistryName,
    memberships: &[NewMembership],
) -> Result<()> {
    sqlx::query("DELETE FROM registry_memberships WHERE registry_name = $1")
        .bind(registry.as_str())
        .execute(&mut **db_tx)
        .await?;

    for membership in memberships {
        sqlx::query(
            r#"
            INSERT INTO registry_memberships
                (registry_name, category, position, title, description, repository_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(registry.as_str())
        .bind(&membership.category)
        .bind(membership.position)
        .bind(&membership.title)
        .bind(&membership.description)
        .bind(membership.repository_id)
        .execute(&mut **db_tx)
        .await?;
    }

    Ok(())
}

/// Lists one registry's memberships in document order.
pub async fn get_registry_memberships(
    db: &DbConnection,
    registry: &RegistryName,
) -> Result<Vec<MembershipDto>> {
    let rows = sqlx::query_as::<_, MembershipDto>(
        r#"
        SELECT id, registry_name, category, position, title, description, repository_id
        FROM registry_memberships
        WHERE registry_name = $1
        ORDER BY position ASC
        "#,
    )
    .bind(registry.as_str())
    .fetch_all(&db.pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(category: &str, position: i64, title: &str) -> NewMembership {
        NewMembership {
            category: category.to_string(),
            position,
            title: title.to_string(),
            description: None,
            repository_id: None,
        }
    }

    async fn seed(db: &DbConnection, registry: &RegistryName, entries: &[NewMembership]) {
        let mut tx = db.pool.begin().await.unwrap();
        replace_registry_memberships_query(&mut tx, registry, entries)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn replace_swaps_full_set() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let go = RegistryName::from_short("go");

        seed(&db, &go, &[membership("Web", 0, "Gin"), membership("Web", 1, "Echo")]).await;
        seed(&db, &go, &[membership("Testing", 0, "Testify")]).await;

        let rows = get_registry_memberships(&db, &go).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Testify");
    }

    #[tokio::test]
    async fn replace_leaves_other_registries_alone() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let go = RegistryName::from_short("go");
        let python = RegistryName::from_short("python");

        seed(&db, &go, &[membership("Web", 0, "Gin")]).await;
        seed(&db, &python, &[membership("Web", 0, "Django")]).await;

        // Wipe go; python must be untouched.
        seed(&db, &go, &[]).await;

        assert!(get_registry_memberships(&db, &go).await.unwrap().is_empty());
        let python_rows = get_registry_memberships(&db, &python).await.unwrap();
        assert_eq!(python_rows.len(), 1);
        assert_eq!(python_rows[0].title, "Django");
    }

    #[tokio::test]
    async fn rollback_restores_previous_set() {
        let db = DbConnection::new_in_memory().await.unwrap();
        let go = RegistryName::from_short("go");

        seed(&db, &go, &[membership("Web", 0, "Gin")]).await;

        // Replace inside a transaction that is rolled back.
        let mut tx = db.pool.begin().await.unwrap();
        replace_registry_memberships_query(&mut tx, &go, &[membership("Web", 0, "Echo")])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let rows = get_registry_memberships(&db, &go).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Gin");
    }
}
