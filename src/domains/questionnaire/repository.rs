use crate::errors::{DbError, DomainError, DomainResult};
use crate::domains::core::repository::{Deletable, FindById};
use crate::domains::questionnaire::types::{
    NewQuestionnaire, Questionnaire, QuestionnaireListRow, QuestionnaireRow, UpdateQuestionnaire,
    derive_table_name,
};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams};
use uuid::Uuid;
use chrono::Utc;
use sqlx::{SqlitePool, query, query_as, query_scalar, Transaction, Sqlite};
use async_trait::async_trait;

/// Questionnaire repository trait
#[async_trait]
pub trait QuestionnaireRepository: Send + Sync + FindById<Questionnaire> + Deletable {
    /// Find all questionnaires, paginated, together with their variable counts
    async fn find_paginated(
        &self,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<(Questionnaire, i64)>>;

    /// Create a new questionnaire
    async fn create(&self, new: NewQuestionnaire, auth: &AuthContext) -> DomainResult<Questionnaire>;

    /// Update an existing questionnaire. The derived table name is never touched.
    async fn update(
        &self,
        id: Uuid,
        update: UpdateQuestionnaire,
        auth: &AuthContext,
    ) -> DomainResult<Questionnaire>;
}

/// SQLite implementation of QuestionnaireRepository
pub struct SqliteQuestionnaireRepository {
    pool: SqlitePool,
}

impl SqliteQuestionnaireRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

}

#[async_trait]
impl FindById<Questionnaire> for SqliteQuestionnaireRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Questionnaire> {
        let row = query_as::<_, QuestionnaireRow>(
            "SELECT * FROM questionnaires WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::EntityNotFound("Questionnaire".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl Deletable for SqliteQuestionnaireRepository {
    fn entity_name(&self) -> &'static str {
        "questionnaires"
    }

    async fn delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let _ = query_scalar::<_, String>("SELECT id FROM questionnaires WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?
            .ok_or_else(|| DomainError::EntityNotFound("Questionnaire".to_string(), id))?;

        // Child variables go first, in the same transaction, so a questionnaire
        // can never be removed while its variables remain.
        let removed_variables = query("DELETE FROM variables WHERE questionnaire_id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let result = query("DELETE FROM questionnaires WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound(self.entity_name().to_string(), id));
        }

        log::info!(
            "Deleted questionnaire {} along with {} variables",
            id,
            removed_variables.rows_affected()
        );
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
impl QuestionnaireRepository for SqliteQuestionnaireRepository {
    async fn find_paginated(
        &self,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<(Questionnaire, i64)>> {
        let total: i64 = query_scalar("SELECT COUNT(*) FROM questionnaires")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let rows = query_as::<_, QuestionnaireListRow>(
            "SELECT q.*,
                (SELECT COUNT(*) FROM variables v WHERE v.questionnaire_id = q.id) AS variable_count
             FROM questionnaires q
             ORDER BY q.name
             LIMIT ? OFFSET ?"
        )
        .bind(params.per_page as i64)
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let count = row.variable_count;
            items.push((row.base.into_entity()?, count));
        }

        Ok(PaginatedResult::new(items, total as u64, params))
    }

    async fn create(&self, new: NewQuestionnaire, auth: &AuthContext) -> DomainResult<Questionnaire> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let table_name = derive_table_name(&new.short_name);
        let created_by = new.created_by_user_id.unwrap_or(auth.user_id).to_string();

        query(
            "INSERT INTO questionnaires (
                id, name, short_name, description, table_name,
                created_at, updated_at, created_by_user_id, updated_by_user_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&new.short_name)
        .bind(&new.description)
        .bind(&table_name)
        .bind(&now)
        .bind(&now)
        .bind(&created_by)
        .bind(auth.user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.find_by_id(id).await
    }

    async fn update(
        &self,
        id: Uuid,
        update: UpdateQuestionnaire,
        _auth: &AuthContext,
    ) -> DomainResult<Questionnaire> {
        let _existing = self.find_by_id(id).await?;

        let mut tx = self.pool.begin().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let now = Utc::now().to_rfc3339();

        if let Some(name) = &update.name {
            query("UPDATE questionnaires SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        // short_name may change, but table_name keeps the value derived at creation
        if let Some(short_name) = &update.short_name {
            query("UPDATE questionnaires SET short_name = ? WHERE id = ?")
                .bind(short_name)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(description) = &update.description {
            query("UPDATE questionnaires SET description = ? WHERE id = ?")
                .bind(description)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        query("UPDATE questionnaires SET updated_at = ?, updated_by_user_id = ? WHERE id = ?")
            .bind(&now)
            .bind(update.updated_by_user_id.to_string())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        tx.commit().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.find_by_id(id).await
    }
}
