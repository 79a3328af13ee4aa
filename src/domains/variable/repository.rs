use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::domains::core::repository::{Deletable, FindById};
use crate::domains::variable::types::{NewVariable, UpdateVariable, Variable, VariableRow};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams};
use uuid::Uuid;
use chrono::Utc;
use sqlx::{SqlitePool, query, query_as, query_scalar, Transaction, Sqlite};
use async_trait::async_trait;

/// Variable repository trait
#[async_trait]
pub trait VariableRepository: Send + Sync + FindById<Variable> + Deletable {
    /// Find the variables of one questionnaire, paginated, in name order
    async fn find_by_questionnaire(
        &self,
        questionnaire_id: Uuid,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Variable>>;

    /// Check whether a variable name is taken anywhere in the system
    async fn name_exists(&self, name: &str, exclude_id: Option<Uuid>) -> DomainResult<bool>;

    /// Create a new variable
    async fn create(&self, new: NewVariable, auth: &AuthContext) -> DomainResult<Variable>;

    /// Update an existing variable
    async fn update(&self, id: Uuid, update: UpdateVariable, auth: &AuthContext) -> DomainResult<Variable>;
}

/// SQLite implementation of VariableRepository
pub struct SqliteVariableRepository {
    pool: SqlitePool,
}

impl SqliteVariableRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

}

#[async_trait]
impl FindById<Variable> for SqliteVariableRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Variable> {
        let row = query_as::<_, VariableRow>(
            "SELECT * FROM variables WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::EntityNotFound("Variable".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl Deletable for SqliteVariableRepository {
    fn entity_name(&self) -> &'static str {
        "variables"
    }

    async fn delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let result = query("DELETE FROM variables WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound(self.entity_name().to_string(), id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid, auth: &AuthContext) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.delete_with_tx(id, auth, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl VariableRepository for SqliteVariableRepository {
    async fn find_by_questionnaire(
        &self,
        questionnaire_id: Uuid,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Variable>> {
        let total: i64 = query_scalar(
            "SELECT COUNT(*) FROM variables WHERE questionnaire_id = ?"
        )
        .bind(questionnaire_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let rows = query_as::<_, VariableRow>(
            "SELECT * FROM variables WHERE questionnaire_id = ? ORDER BY name LIMIT ? OFFSET ?"
        )
        .bind(questionnaire_id.to_string())
        .bind(params.per_page as i64)
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row.into_entity()?);
        }

        Ok(PaginatedResult::new(items, total as u64, params))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<Uuid>) -> DomainResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                query_scalar("SELECT COUNT(*) FROM variables WHERE name = ? AND id != ?")
                    .bind(name)
                    .bind(id.to_string())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            },
            None => {
                query_scalar("SELECT COUNT(*) FROM variables WHERE name = ?")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            }
        };

        Ok(count > 0)
    }

    async fn create(&self, new: NewVariable, auth: &AuthContext) -> DomainResult<Variable> {
        // Names are unique across the whole system, not per questionnaire
        if self.name_exists(&new.name, None).await? {
            return Err(DomainError::Validation(ValidationError::unique("name")));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let created_by = new.created_by_user_id.unwrap_or(auth.user_id).to_string();

        query(
            "INSERT INTO variables (
                id, questionnaire_id, name, label, type, \"values\",
                created_at, updated_at, created_by_user_id, updated_by_user_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(new.questionnaire_id.to_string())
        .bind(&new.name)
        .bind(&new.label)
        .bind(&new.variable_type)
        .bind(&new.values)
        .bind(&now)
        .bind(&now)
        .bind(&created_by)
        .bind(auth.user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.find_by_id(id).await
    }

    async fn update(&self, id: Uuid, update: UpdateVariable, auth: &AuthContext) -> DomainResult<Variable> {
        let existing = self.find_by_id(id).await?;

        if let Some(name) = &update.name {
            if name != &existing.name && self.name_exists(name, Some(id)).await? {
                return Err(DomainError::Validation(ValidationError::unique("name")));
            }
        }

        let mut tx = self.pool.begin().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let now = Utc::now().to_rfc3339();

        if let Some(name) = &update.name {
            query("UPDATE variables SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(label) = &update.label {
            query("UPDATE variables SET label = ? WHERE id = ?")
                .bind(label)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(variable_type) = &update.variable_type {
            query("UPDATE variables SET type = ? WHERE id = ?")
                .bind(variable_type)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(values) = &update.values {
            query("UPDATE variables SET \"values\" = ? WHERE id = ?")
                .bind(values)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        let updated_by = update.updated_by_user_id.unwrap_or(auth.user_id);
        query("UPDATE variables SET updated_at = ?, updated_by_user_id = ? WHERE id = ?")
            .bind(&now)
            .bind(updated_by.to_string())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        tx.commit().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::questionnaire::repository::{
        QuestionnaireRepository, SqliteQuestionnaireRepository,
    };
    use crate::domains::questionnaire::types::NewQuestionnaire;
    use crate::types::UserRole;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::run_migrations(&pool).await.unwrap();
        pool
    }

    fn superadmin() -> AuthContext {
        AuthContext::new(Uuid::new_v4(), UserRole::Superadmin)
    }

    async fn create_questionnaire(pool: &SqlitePool, short_name: &str) -> Uuid {
        let repo = SqliteQuestionnaireRepository::new(pool.clone());
        let q = repo.create(
            NewQuestionnaire {
                name: format!("Questionnaire {}", short_name),
                short_name: short_name.to_string(),
                description: "Test questionnaire".to_string(),
                created_by_user_id: None,
            },
            &superadmin(),
        )
        .await
        .unwrap();
        q.id
    }

    fn new_variable(questionnaire_id: Uuid, name: &str) -> NewVariable {
        NewVariable {
            questionnaire_id,
            name: name.to_string(),
            label: name.to_string(),
            variable_type: "integer".to_string(),
            values: Some("".to_string()),
            created_by_user_id: None,
        }
    }

    #[tokio::test]
    async fn test_name_is_unique_across_questionnaires() {
        let pool = setup_pool().await;
        let repo = SqliteVariableRepository::new(pool.clone());
        let auth = superadmin();

        let first = create_questionnaire(&pool, "bdi").await;
        let second = create_questionnaire(&pool, "scl90").await;

        repo.create(new_variable(first, "age"), &auth).await.unwrap();

        // Same name under a different questionnaire still collides
        let duplicate = repo.create(new_variable(second, "age"), &auth).await;
        assert!(matches!(
            duplicate,
            Err(DomainError::Validation(ValidationError::Unique { .. }))
        ));

        assert!(repo.name_exists("age", None).await.unwrap());
        assert!(!repo.name_exists("sex", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = setup_pool().await;
        let repo = SqliteVariableRepository::new(pool.clone());
        let auth = superadmin();

        let qid = create_questionnaire(&pool, "bdi").await;
        let v = repo.create(new_variable(qid, "age"), &auth).await.unwrap();

        let update = UpdateVariable {
            label: Some("Age in years".to_string()),
            variable_type: Some("varchar".to_string()),
            ..Default::default()
        };
        let updated = repo.update(v.id, update, &auth).await.unwrap();
        assert_eq!(updated.label, "Age in years");
        assert_eq!(updated.variable_type.as_str(), "varchar");
        assert_eq!(updated.name, "age");

        repo.delete(v.id, &auth).await.unwrap();
        assert!(matches!(
            repo.find_by_id(v.id).await,
            Err(DomainError::EntityNotFound(_, _))
        ));
    }

    #[tokio::test]
    async fn test_find_by_questionnaire_pages_by_ten() {
        let pool = setup_pool().await;
        let repo = SqliteVariableRepository::new(pool.clone());
        let auth = superadmin();

        let qid = create_questionnaire(&pool, "bdi").await;
        for i in 0..12 {
            repo.create(new_variable(qid, &format!("item_{:02}", i)), &auth).await.unwrap();
        }

        let page = repo.find_by_questionnaire(qid, PaginationParams::default()).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total_pages, 2);

        let page_two = repo
            .find_by_questionnaire(qid, PaginationParams { page: 2, per_page: 10 })
            .await
            .unwrap();
        assert_eq!(page_two.items.len(), 2);
    }
}
