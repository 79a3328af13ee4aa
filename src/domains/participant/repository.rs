use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::domains::core::repository::{Deletable, FindById};
use crate::domains::participant::types::{
    code_fingerprint, NewParticipant, Participant, ParticipantFilter, ParticipantRow,
    UpdateParticipant,
};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams};
use uuid::Uuid;
use chrono::Utc;
use sqlx::{SqlitePool, query, query_as, query_scalar, Transaction, Sqlite};
use async_trait::async_trait;

/// Participant repository trait
#[async_trait]
pub trait ParticipantRepository: Send + Sync + FindById<Participant> + Deletable {
    /// Find a participant by unique code
    async fn find_by_code(&self, unique_code: &str) -> DomainResult<Participant>;

    /// Find participants matching the filter, paginated, in code order
    async fn find_paginated(
        &self,
        filter: &ParticipantFilter,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Participant>>;

    /// Check whether a unique code is taken
    async fn code_exists(&self, unique_code: &str, exclude_id: Option<Uuid>) -> DomainResult<bool>;

    /// Create a new participant
    async fn create(&self, new: NewParticipant, auth: &AuthContext) -> DomainResult<Participant>;

    /// Update an existing participant
    async fn update(
        &self,
        id: Uuid,
        update: UpdateParticipant,
        auth: &AuthContext,
    ) -> DomainResult<Participant>;
}

/// SQLite implementation of ParticipantRepository
pub struct SqliteParticipantRepository {
    pool: SqlitePool,
}

impl SqliteParticipantRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn filter_clauses(filter: &ParticipantFilter) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(excluded) = filter.excluded {
            clauses.push(format!(
                "COALESCE(excluded, 0) = {}",
                if excluded { 1 } else { 0 }
            ));
        }

        if let Some(search) = &filter.search_text {
            clauses.push("(unique_code LIKE ? OR notes LIKE ?)".to_string());
            let pattern = format!("%{}%", search);
            binds.push(pattern.clone());
            binds.push(pattern);
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        (where_sql, binds)
    }
}

#[async_trait]
impl FindById<Participant> for SqliteParticipantRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Participant> {
        let row = query_as::<_, ParticipantRow>(
            "SELECT * FROM participants WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::EntityNotFound("Participant".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl Deletable for SqliteParticipantRepository {
    fn entity_name(&self) -> &'static str {
        "participants"
    }

    async fn delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let result = query("DELETE FROM participants WHERE id = ?")
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
impl ParticipantRepository for SqliteParticipantRepository {
    async fn find_by_code(&self, unique_code: &str) -> DomainResult<Participant> {
        let row = query_as::<_, ParticipantRow>(
            "SELECT * FROM participants WHERE unique_code = ?"
        )
        .bind(unique_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::Internal(format!("Participant not found with code: {}", unique_code)))?;

        row.into_entity()
    }

    async fn find_paginated(
        &self,
        filter: &ParticipantFilter,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Participant>> {
        let (where_sql, binds) = Self::filter_clauses(filter);

        let count_sql = format!("SELECT COUNT(*) FROM participants{}", where_sql);
        let mut count_query = query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let rows_sql = format!(
            "SELECT * FROM participants{} ORDER BY unique_code LIMIT ? OFFSET ?",
            where_sql
        );
        let mut rows_query = query_as::<_, ParticipantRow>(&rows_sql);
        for bind in &binds {
            rows_query = rows_query.bind(bind);
        }
        let rows = rows_query
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

    async fn code_exists(&self, unique_code: &str, exclude_id: Option<Uuid>) -> DomainResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                query_scalar("SELECT COUNT(*) FROM participants WHERE unique_code = ? AND id != ?")
                    .bind(unique_code)
                    .bind(id.to_string())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            },
            None => {
                query_scalar("SELECT COUNT(*) FROM participants WHERE unique_code = ?")
                    .bind(unique_code)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            }
        };

        Ok(count > 0)
    }

    async fn create(&self, new: NewParticipant, auth: &AuthContext) -> DomainResult<Participant> {
        if self.code_exists(&new.unique_code, None).await? {
            return Err(DomainError::Validation(ValidationError::unique("unique_code")));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let hash = code_fingerprint(&new.unique_code);
        let created_by = new.created_by_user_id.unwrap_or(auth.user_id).to_string();

        query(
            "INSERT INTO participants (
                id, unique_code, study_group, sex, adopted, birth_date,
                excluded, exclusion_reason, hash, notes,
                created_at, updated_at, created_by_user_id, updated_by_user_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(&new.unique_code)
        .bind(new.study_group)
        .bind(new.sex)
        .bind(new.adopted.map(|v| if v { 1 } else { 0 }))
        .bind(&new.birth_date)
        .bind(new.excluded.map(|v| if v { 1 } else { 0 }))
        .bind(&new.exclusion_reason)
        .bind(&hash)
        .bind(&new.notes)
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
        update: UpdateParticipant,
        auth: &AuthContext,
    ) -> DomainResult<Participant> {
        let existing = self.find_by_id(id).await?;

        if let Some(code) = &update.unique_code {
            if code != &existing.unique_code && self.code_exists(code, Some(id)).await? {
                return Err(DomainError::Validation(ValidationError::unique("unique_code")));
            }
        }

        let mut tx = self.pool.begin().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let now = Utc::now().to_rfc3339();

        if let Some(code) = &update.unique_code {
            // The stored fingerprint follows the code
            query("UPDATE participants SET unique_code = ?, hash = ? WHERE id = ?")
                .bind(code)
                .bind(code_fingerprint(code))
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(study_group) = update.study_group {
            query("UPDATE participants SET study_group = ? WHERE id = ?")
                .bind(study_group)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(sex) = update.sex {
            query("UPDATE participants SET sex = ? WHERE id = ?")
                .bind(sex)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(adopted) = update.adopted {
            query("UPDATE participants SET adopted = ? WHERE id = ?")
                .bind(if adopted { 1 } else { 0 })
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(birth_date) = &update.birth_date {
            query("UPDATE participants SET birth_date = ? WHERE id = ?")
                .bind(birth_date)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(excluded) = update.excluded {
            query("UPDATE participants SET excluded = ? WHERE id = ?")
                .bind(if excluded { 1 } else { 0 })
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(reason) = &update.exclusion_reason {
            query("UPDATE participants SET exclusion_reason = ? WHERE id = ?")
                .bind(reason)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(notes) = &update.notes {
            query("UPDATE participants SET notes = ? WHERE id = ?")
                .bind(notes)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        let updated_by = update.updated_by_user_id.unwrap_or(auth.user_id);
        query("UPDATE participants SET updated_at = ?, updated_by_user_id = ? WHERE id = ?")
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

    fn new_participant(code: &str) -> NewParticipant {
        NewParticipant {
            unique_code: code.to_string(),
            study_group: Some(1),
            sex: Some(2),
            adopted: Some(false),
            birth_date: Some("2011-06-30".to_string()),
            excluded: Some(false),
            exclusion_reason: None,
            notes: None,
            created_by_user_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_stores_code_fingerprint() {
        let pool = setup_pool().await;
        let repo = SqliteParticipantRepository::new(pool);
        let auth = superadmin();

        let created = repo.create(new_participant("G01_A0001"), &auth).await.unwrap();
        assert_eq!(created.unique_code, "G01_A0001");
        assert_eq!(created.hash.as_deref(), Some(code_fingerprint("G01_A0001").as_str()));
        assert_eq!(created.birth_date.map(|d| d.to_string()), Some("2011-06-30".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let pool = setup_pool().await;
        let repo = SqliteParticipantRepository::new(pool);
        let auth = superadmin();

        repo.create(new_participant("G01_A0001"), &auth).await.unwrap();
        let duplicate = repo.create(new_participant("G01_A0001"), &auth).await;
        assert!(matches!(
            duplicate,
            Err(DomainError::Validation(ValidationError::Unique { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_code_recomputes_fingerprint() {
        let pool = setup_pool().await;
        let repo = SqliteParticipantRepository::new(pool);
        let auth = superadmin();

        let created = repo.create(new_participant("G01_A0001"), &auth).await.unwrap();

        let update = UpdateParticipant {
            unique_code: Some("G02_B0002".to_string()),
            excluded: Some(true),
            exclusion_reason: Some("Withdrew consent".to_string()),
            ..Default::default()
        };
        let updated = repo.update(created.id, update, &auth).await.unwrap();

        assert_eq!(updated.unique_code, "G02_B0002");
        assert_eq!(updated.hash.as_deref(), Some(code_fingerprint("G02_B0002").as_str()));
        assert_eq!(updated.excluded, Some(true));
        assert_eq!(updated.exclusion_reason.as_deref(), Some("Withdrew consent"));
    }

    #[tokio::test]
    async fn test_excluded_filter_and_search() {
        let pool = setup_pool().await;
        let repo = SqliteParticipantRepository::new(pool);
        let auth = superadmin();

        repo.create(new_participant("G01_A0001"), &auth).await.unwrap();
        let mut excluded = new_participant("G01_A0002");
        excluded.excluded = Some(true);
        excluded.exclusion_reason = Some("Moved away".to_string());
        repo.create(excluded, &auth).await.unwrap();

        let page = repo
            .find_paginated(&ParticipantFilter::new().excluded_only(), PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].unique_code, "G01_A0002");

        let page = repo
            .find_paginated(&ParticipantFilter::new().not_excluded(), PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].unique_code, "G01_A0001");

        let page = repo
            .find_paginated(
                &ParticipantFilter::new().with_search_text("A0002".to_string()),
                PaginationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
