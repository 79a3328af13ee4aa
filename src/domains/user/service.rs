use crate::errors::{ServiceError, ServiceResult, DomainError};
use crate::domains::user::types::{NewUser, UpdateUser, User, UserResponse};
use crate::domains::user::repository::UserRepository;
use crate::domains::core::repository::{Deletable, FindById};
use crate::auth::{AuthContext, AuthService};
use crate::types::{PaginatedResult, PaginationParams, Permission};
use crate::validation::Validate;
use uuid::Uuid;
use std::sync::Arc;

/// Service for user-related operations
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    auth_service: Arc<AuthService>,
}

impl UserService {
    /// Create a new user service
    pub fn new(user_repo: Arc<dyn UserRepository>, auth_service: Arc<AuthService>) -> Self {
        Self { user_repo, auth_service }
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<User> {
        auth.authorize(Permission::ViewUsers)?;

        self.user_repo.find_by_id(id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Get a user by ID as response DTO
    pub async fn get_user_response(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<UserResponse> {
        let user = self.get_user(id, auth).await?;
        Ok(user.into())
    }

    /// List users, paginated
    pub async fn list_users(
        &self,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<UserResponse>> {
        auth.authorize(Permission::ViewUsers)?;

        let page = self.user_repo.find_paginated(params)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(PaginatedResult {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
        })
    }

    /// Create a new user
    pub async fn create_user(&self, user: NewUser, auth: &AuthContext) -> ServiceResult<UserResponse> {
        auth.authorize(Permission::ManageUsers)?;

        user.validate().map_err(ServiceError::Domain)?;

        let mut user = user;
        user.email = user.email.to_lowercase();
        user.password = self.auth_service.hash_password(&user.password)?;

        let created = self.user_repo.create(user, auth)
            .await
            .map_err(ServiceError::Domain)?;

        log::info!("Created user {} with role {}", created.email, created.role.as_str());
        Ok(created.into())
    }

    /// Update an existing user.
    ///
    /// An empty new password means "keep the current one": the field is
    /// cleared before validation so the stored hash is never overwritten
    /// with a hash of the empty string.
    pub async fn update_user(&self, id: Uuid, update: UpdateUser, auth: &AuthContext) -> ServiceResult<UserResponse> {
        // Only superadmins may update other users
        if id != auth.user_id {
            auth.authorize(Permission::ManageUsers)?;
        }

        let mut update = update;
        if update.password.as_deref().is_some_and(|p| p.is_empty()) {
            update.password = None;
        }

        update.validate().map_err(ServiceError::Domain)?;

        if let Some(email) = update.email.take() {
            update.email = Some(email.to_lowercase());
        }
        if let Some(password) = update.password.take() {
            update.password = Some(self.auth_service.hash_password(&password)?);
        }

        let updated = self.user_repo.update(id, update, auth)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(updated.into())
    }

    /// Update current user's profile. Role and active status stay out of reach.
    pub async fn update_current_user(&self, update: UpdateUser, auth: &AuthContext) -> ServiceResult<UserResponse> {
        if update.role.is_some() || update.active.is_some() {
            return Err(ServiceError::PermissionDenied(
                "Cannot change role or active status for your own account".to_string()
            ));
        }

        self.update_user(auth.user_id, update, auth).await
    }

    /// Delete a user. No cascade is defined for users.
    pub async fn delete_user(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::ManageUsers)?;

        if id == auth.user_id {
            return Err(ServiceError::Domain(
                DomainError::Validation(
                    crate::errors::ValidationError::custom("Cannot delete your own user account")
                )
            ));
        }

        self.user_repo.delete(id, auth)
            .await
            .map_err(ServiceError::Domain)?;

        log::info!("Deleted user {}", id);
        Ok(())
    }

    /// Get current user profile
    pub async fn get_current_user(&self, auth: &AuthContext) -> ServiceResult<User> {
        self.user_repo.find_by_id(auth.user_id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Check if email is unique
    pub async fn is_email_unique(&self, email: &str, exclude_id: Option<Uuid>) -> ServiceResult<bool> {
        self.user_repo.is_email_unique(&email.to_lowercase(), exclude_id)
            .await
            .map_err(ServiceError::Domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt;
    use crate::domains::user::repository::SqliteUserRepository;
    use crate::types::UserRole;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (UserService, Arc<AuthService>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::run_migrations(&pool).await.unwrap();

        let repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool));
        let auth_service = Arc::new(AuthService::new(repo.clone()));
        (UserService::new(repo, auth_service.clone()), auth_service)
    }

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role)
    }

    fn new_user(email: &str, name: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: "Secret123".to_string(),
            role: "data_entry".to_string(),
            active: true,
            email_verified: true,
            created_by_user_id: None,
        }
    }

    #[tokio::test]
    async fn test_only_superadmin_manages_users() {
        let (service, _) = setup().await;

        for role in [UserRole::Admin, UserRole::DataEntry, UserRole::Consultor] {
            let denied = service.create_user(new_user("a@example.com", "A"), &ctx(role)).await;
            assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));
        }

        let created = service
            .create_user(new_user("a@example.com", "A"), &ctx(UserRole::Superadmin))
            .await
            .unwrap();
        assert_eq!(created.role, "data_entry");

        // Admin may still list users
        let listed = service.list_users(PaginationParams::default(), &ctx(UserRole::Admin)).await;
        assert!(listed.is_ok());
        // Lower tiers may not
        let denied = service.list_users(PaginationParams::default(), &ctx(UserRole::Consultor)).await;
        assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_email_is_stored_lowercase_and_password_hashed() {
        let (service, _) = setup().await;
        let superadmin = ctx(UserRole::Superadmin);

        let created = service
            .create_user(new_user("Ana.Lab@Example.COM", "Ana"), &superadmin)
            .await
            .unwrap();
        assert_eq!(created.email, "ana.lab@example.com");

        let stored = service.get_user(created.id, &superadmin).await.unwrap();
        assert_ne!(stored.password_hash, "Secret123");
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_empty_password_update_keeps_existing_hash() {
        let (service, _) = setup().await;
        let superadmin = ctx(UserRole::Superadmin);

        let created = service.create_user(new_user("a@example.com", "A"), &superadmin).await.unwrap();
        let before = service.get_user(created.id, &superadmin).await.unwrap().password_hash;

        let update = UpdateUser {
            name: Some("A. Renamed".to_string()),
            password: Some("".to_string()),
            ..Default::default()
        };
        let updated = service.update_user(created.id, update, &superadmin).await.unwrap();
        assert_eq!(updated.name, "A. Renamed");

        let after = service.get_user(created.id, &superadmin).await.unwrap().password_hash;
        assert_eq!(before, after);

        // A real password replaces the hash
        let update = UpdateUser {
            password: Some("NewSecret123".to_string()),
            ..Default::default()
        };
        service.update_user(created.id, update, &superadmin).await.unwrap();
        let replaced = service.get_user(created.id, &superadmin).await.unwrap().password_hash;
        assert_ne!(replaced, after);
    }

    #[tokio::test]
    async fn test_self_deletion_is_refused() {
        let (service, _) = setup().await;
        let superadmin = ctx(UserRole::Superadmin);

        let created = service.create_user(new_user("a@example.com", "A"), &superadmin).await.unwrap();

        let own_context = AuthContext::new(created.id, UserRole::Superadmin);
        assert!(service.delete_user(created.id, &own_context).await.is_err());

        // Another superadmin can delete the account
        service.delete_user(created.id, &superadmin).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let (service, auth_service) = setup().await;
        jwt::initialize("test-secret-for-user-service");

        service
            .create_user(new_user("ana@example.com", "Ana"), &ctx(UserRole::Superadmin))
            .await
            .unwrap();

        let login = auth_service.login("Ana@Example.com", "Secret123").await.unwrap();
        assert_eq!(login.role, UserRole::DataEntry);

        let verified = auth_service.verify_token(&login.access_token).await.unwrap();
        assert_eq!(verified.user_id, login.user_id);
        assert_eq!(verified.role, UserRole::DataEntry);

        let failed = auth_service.login("ana@example.com", "WrongPassword").await;
        assert!(matches!(failed, Err(ServiceError::Authentication(_))));
    }
}
