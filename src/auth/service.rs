use crate::errors::{ServiceError, ServiceResult, DomainError};
use crate::auth::{AuthContext, jwt};
use crate::domains::user::repository::UserRepository;
use crate::domains::user::types::Credentials;
use crate::types::UserRole;
use crate::validation::Validate;
use uuid::Uuid;
use argon2::{Argon2, PasswordHash, PasswordVerifier, PasswordHasher, password_hash::SaltString};
// Use the older rand version for compatibility with argon2
use rand_core::OsRng as ArgonOsRng;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Results from a successful login, including refresh token
#[derive(Debug)]
pub struct LoginResult {
    pub user_id: Uuid,
    pub role: UserRole,
    pub auth_context: AuthContext,
    pub access_token: String,
    pub access_expiry: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expiry: DateTime<Utc>,
}

/// Auth service for handling user authentication
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Authenticate a user with email and password, returning access and refresh tokens
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResult> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        credentials.validate().map_err(ServiceError::Domain)?;

        let user = match self.user_repo.find_by_email(&email.to_lowercase()).await {
            Ok(user) => user,
            Err(_) => {
                return Err(ServiceError::Authentication("Invalid email or password".to_string()));
            }
        };

        if !user.is_active() {
            return Err(ServiceError::Authentication("Account is inactive".to_string()));
        }

        if self.verify_password(password, &user.password_hash).is_err() {
            return Err(ServiceError::Authentication("Invalid email or password".to_string()));
        }

        self.user_repo.update_last_login(user.id)
            .await
            .map_err(ServiceError::Domain)?;

        let (access_token, access_expiry) = jwt::generate_token(
            &user.id, &user.role, jwt::TokenType::Access
        )?;
        let (refresh_token, _, refresh_expiry) = jwt::generate_refresh_token(
            &user.id, &user.role
        )?;

        let auth_context = AuthContext::new(user.id, user.role);

        log::info!("User {} logged in", user.id);

        Ok(LoginResult {
            user_id: user.id,
            role: user.role,
            auth_context,
            access_token,
            access_expiry,
            refresh_token,
            refresh_expiry,
        })
    }

    /// Verify an access token and create an auth context
    pub async fn verify_token(&self, token: &str) -> ServiceResult<AuthContext> {
        let claims = jwt::verify_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Authentication("Invalid user ID in token".to_string()))?;

        let role = UserRole::from_str(&claims.role)
            .ok_or_else(|| ServiceError::Authentication("Invalid role in token".to_string()))?;

        // Refresh tokens may not be used in place of access tokens
        if claims.refresh_exp.is_some() {
            return Err(ServiceError::Authentication("Expected access token, received refresh token".to_string()));
        }

        Ok(AuthContext::new(user_id, role))
    }

    /// Refresh an access token using a refresh token
    pub async fn refresh_session(&self, refresh_token: &str) -> ServiceResult<(String, DateTime<Utc>)> {
        let (new_access_token, new_access_expiry) = jwt::refresh_access_token(refresh_token)?;

        Ok((new_access_token, new_access_expiry))
    }

    /// Generate a hash for a new password
    pub fn hash_password(&self, password: &str) -> ServiceResult<String> {
        let mut rng = ArgonOsRng;
        let salt = SaltString::generate(&mut rng);

        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("Failed to hash password: {}", e))))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<(), ServiceError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| ServiceError::Domain(DomainError::Internal("Invalid password hash format".to_string())))?;

        Argon2::default().verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ServiceError::Authentication("Invalid password".to_string()))
    }
}
