use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::domains::core::repository::{Deletable, FindById};
use crate::domains::user::types::{NewUser, UpdateUser, User, UserRow};
use crate::auth::AuthContext;
use crate::types::{PaginatedResult, PaginationParams};
use uuid::Uuid;
use chrono::Utc;
use sqlx::{SqlitePool, query, query_as, query_scalar, Transaction, Sqlite};
use async_trait::async_trait;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync + FindById<User> + Deletable {
    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> DomainResult<User>;

    /// Find all users, paginated, in name order
    async fn find_paginated(&self, params: PaginationParams) -> DomainResult<PaginatedResult<User>>;

    /// Create a new user. The password must already be hashed.
    async fn create(&self, user: NewUser, auth: &AuthContext) -> DomainResult<User>;

    /// Update an existing user. A present password must already be hashed;
    /// an absent one leaves the stored hash untouched.
    async fn update(&self, id: Uuid, update: UpdateUser, auth: &AuthContext) -> DomainResult<User>;

    /// Update last login timestamp
    async fn update_last_login(&self, id: Uuid) -> DomainResult<()>;

    /// Check if email is unique
    async fn is_email_unique(&self, email: &str, exclude_id: Option<Uuid>) -> DomainResult<bool>;

    /// Check if name is unique
    async fn is_name_unique(&self, name: &str, exclude_id: Option<Uuid>) -> DomainResult<bool>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

}

#[async_trait]
impl FindById<User> for SqliteUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<User> {
        let row = query_as::<_, UserRow>(
            "SELECT * FROM users WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::EntityNotFound("User".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl Deletable for SqliteUserRepository {
    fn entity_name(&self) -> &'static str {
        "users"
    }

    async fn delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let result = query("DELETE FROM users WHERE id = ?")
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
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> DomainResult<User> {
        let row = query_as::<_, UserRow>(
            "SELECT * FROM users WHERE email = ?"
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?
        .ok_or_else(|| DomainError::Internal(format!("User not found with email: {}", email)))?;

        row.into_entity()
    }

    async fn find_paginated(&self, params: PaginationParams) -> DomainResult<PaginatedResult<User>> {
        let total: i64 = query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let rows = query_as::<_, UserRow>(
            "SELECT * FROM users ORDER BY name LIMIT ? OFFSET ?"
        )
        .bind(params.per_page as i64)
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(row.into_entity()?);
        }

        Ok(PaginatedResult::new(users, total as u64, params))
    }

    async fn create(&self, user: NewUser, auth: &AuthContext) -> DomainResult<User> {
        if !self.is_email_unique(&user.email, None).await? {
            return Err(DomainError::Validation(ValidationError::unique("email")));
        }
        if !self.is_name_unique(&user.name, None).await? {
            return Err(DomainError::Validation(ValidationError::unique("name")));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let created_by = user.created_by_user_id.unwrap_or(auth.user_id).to_string();
        let active = if user.active { 1 } else { 0 };
        let email_verified_at = if user.email_verified { Some(now.clone()) } else { None };

        query(
            "INSERT INTO users (
                id, email, name, password_hash, role, active, email_verified_at,
                created_at, updated_at, created_by_user_id, updated_by_user_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password) // Hashed by the service before it reaches the repository
        .bind(&user.role)
        .bind(active)
        .bind(&email_verified_at)
        .bind(&now)
        .bind(&now)
        .bind(&created_by)
        .bind(auth.user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.find_by_id(id).await
    }

    async fn update(&self, id: Uuid, update: UpdateUser, auth: &AuthContext) -> DomainResult<User> {
        let user = self.find_by_id(id).await?;

        if let Some(email) = &update.email {
            if email != &user.email && !self.is_email_unique(email, Some(id)).await? {
                return Err(DomainError::Validation(ValidationError::unique("email")));
            }
        }
        if let Some(name) = &update.name {
            if name != &user.name && !self.is_name_unique(name, Some(id)).await? {
                return Err(DomainError::Validation(ValidationError::unique("name")));
            }
        }

        let mut tx = self.pool.begin().await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        let now = Utc::now().to_rfc3339();

        if let Some(email) = &update.email {
            query("UPDATE users SET email = ? WHERE id = ?")
                .bind(email)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(name) = &update.name {
            query("UPDATE users SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(password_hash) = &update.password {
            query("UPDATE users SET password_hash = ? WHERE id = ?")
                .bind(password_hash)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(role) = &update.role {
            query("UPDATE users SET role = ? WHERE id = ?")
                .bind(role)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(active) = update.active {
            query("UPDATE users SET active = ? WHERE id = ?")
                .bind(if active { 1 } else { 0 })
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        if let Some(email_verified) = update.email_verified {
            let verified_at = if email_verified { Some(now.clone()) } else { None };
            query("UPDATE users SET email_verified_at = ? WHERE id = ?")
                .bind(&verified_at)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;
        }

        let updated_by = update.updated_by_user_id.unwrap_or(auth.user_id);
        query("UPDATE users SET updated_at = ?, updated_by_user_id = ? WHERE id = ?")
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

    async fn update_last_login(&self, id: Uuid) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        Ok(())
    }

    async fn is_email_unique(&self, email: &str, exclude_id: Option<Uuid>) -> DomainResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                    .bind(email)
                    .bind(id.to_string())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            },
            None => {
                query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            }
        };

        Ok(count == 0)
    }

    async fn is_name_unique(&self, name: &str, exclude_id: Option<Uuid>) -> DomainResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                query_scalar("SELECT COUNT(*) FROM users WHERE name = ? AND id != ?")
                    .bind(name)
                    .bind(id.to_string())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            },
            None => {
                query_scalar("SELECT COUNT(*) FROM users WHERE name = ?")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Database(DbError::from(e)))?
            }
        };

        Ok(count == 0)
    }
}
