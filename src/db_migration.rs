use crate::errors::{DbError, DbResult, DomainError, ServiceError, ServiceResult};
use crate::globals;
use sqlx::SqlitePool;

// Embed all migration SQL files at compile time
const MIGRATION_INITIAL: &str = include_str!("../migrations/20250909000001_initial_schema.sql");
const MIGRATION_INDEXES: &str = include_str!("../migrations/20250909000002_indexes.sql");

// List of migrations with their names and SQL content, in apply order
const MIGRATIONS: &[(&str, &str)] = &[
    ("20250909000001_initial_schema.sql", MIGRATION_INITIAL),
    ("20250909000002_indexes.sql", MIGRATION_INDEXES),
];

/// Initialize the database with migrations
pub async fn initialize_database() -> ServiceResult<()> {
    let pool = globals::get_db_pool()?;

    run_migrations(&pool)
        .await
        .map_err(|e| ServiceError::Domain(DomainError::Database(e)))
}

/// Apply all pending migrations to the given pool
pub(crate) async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    create_migrations_table(pool).await?;

    let applied = applied_migrations(pool).await?;

    let pending: Vec<(&str, &str)> = MIGRATIONS
        .iter()
        .copied()
        .filter(|(name, _)| !applied.iter().any(|a| a == name))
        .collect();

    if pending.is_empty() {
        log::debug!("No pending migrations to apply");
        return Ok(());
    }

    let mut tx = pool.begin().await
        .map_err(|e| DbError::Transaction(format!("Failed to begin migration transaction: {}", e)))?;

    for (name, sql) in pending {
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to apply migration {}: {}", name, e)))?;

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(name)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to record migration {}: {}", name, e)))?;

        log::info!("Applied migration {}", name);
    }

    tx.commit().await
        .map_err(|e| DbError::Transaction(format!("Failed to commit migrations: {}", e)))?;

    Ok(())
}

/// Create migrations table if it doesn't exist
async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

/// Names of the migrations already applied
async fn applied_migrations(pool: &SqlitePool) -> DbResult<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| DbError::Migration(format!("Failed to read applied migrations: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_migrations_apply_once_and_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        // A second run sees every migration as applied
        run_migrations(&pool).await.unwrap();

        let applied = applied_migrations(&pool).await.unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());

        // The schema is usable after migration
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
