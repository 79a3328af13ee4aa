use crate::errors::{DomainError, DomainResult};
use crate::validation::{Validate, ValidationBuilder};
use crate::types::UserRole;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sqlx::FromRow;

const ROLE_NAMES: &[&str] = &["superadmin", "admin", "data_entry", "consultor"];

/// Core User entity - represents a user in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

impl User {
    // Helper to check if user is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    // Helper to check if user is the superadmin tier
    pub fn is_superadmin(&self) -> bool {
        matches!(self.role, UserRole::Superadmin)
    }
}

/// NewUser DTO - used when creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String, // Plain text password (will be hashed)
    pub role: String,
    pub active: bool,
    pub email_verified: bool,
    pub created_by_user_id: Option<Uuid>,
}

impl Validate for NewUser {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(255)
            .validate()?;

        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .max_length(255)
            .validate()?;

        ValidationBuilder::new("password", Some(self.password.clone()))
            .required()
            .min_length(8)
            .validate()?;

        ValidationBuilder::new("role", Some(self.role.clone()))
            .required()
            .one_of(ROLE_NAMES, Some("Invalid role"))
            .validate()?;

        Ok(())
    }
}

/// UpdateUser DTO - used when updating an existing user.
/// An empty or missing password leaves the stored hash unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>, // Plain text password (will be hashed)
    pub role: Option<String>,
    pub active: Option<bool>,
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub updated_by_user_id: Option<Uuid>,
}

impl Validate for UpdateUser {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .required()
                .max_length(255)
                .validate()?;
        }

        if let Some(email) = &self.email {
            ValidationBuilder::new("email", Some(email.clone()))
                .email()
                .max_length(255)
                .validate()?;
        }

        if let Some(password) = &self.password {
            ValidationBuilder::new("password", Some(password.clone()))
                .min_length(8)
                .validate()?;
        }

        if let Some(role) = &self.role {
            ValidationBuilder::new("role", Some(role.clone()))
                .one_of(ROLE_NAMES, Some("Invalid role"))
                .validate()?;
        }

        Ok(())
    }
}

impl UpdateUser {
    /// Check whether the update payload carries any field changes.
    pub fn is_empty_update(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.active.is_none()
            && self.email_verified.is_none()
    }
}

/// Credentials DTO - used for login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for Credentials {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        ValidationBuilder::new("password", Some(self.password.clone()))
            .required()
            .validate()?;

        Ok(())
    }
}

/// UserRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub active: i64,
    pub email_verified_at: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl UserRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<User> {
        let parse_uuid = |s: &Option<String>| -> DomainResult<Option<Uuid>> {
            match s {
                Some(id) => Uuid::parse_str(id)
                    .map(Some)
                    .map_err(|_| DomainError::InvalidUuid(id.clone())),
                None => Ok(None),
            }
        };
        let parse_datetime = |s: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid date format: {}", s)))
        };
        let parse_optional_datetime = |s: &Option<String>| -> DomainResult<Option<DateTime<Utc>>> {
            match s {
                Some(dt) => parse_datetime(dt).map(Some),
                None => Ok(None),
            }
        };

        Ok(User {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role: UserRole::from_str(&self.role)
                .ok_or_else(|| DomainError::Internal(format!("Invalid role: {}", self.role)))?,
            active: self.active != 0,
            email_verified_at: parse_optional_datetime(&self.email_verified_at)?,
            last_login: parse_optional_datetime(&self.last_login)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_uuid(&self.updated_by_user_id)?,
        })
    }
}

/// UserResponse DTO - used for API responses (excludes sensitive fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub active: bool,
    pub email_verified: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role.as_str().to_string(),
            active: user.active,
            email_verified: user.email_verified_at.is_some(),
            last_login: user.last_login.map(|dt| dt.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}
