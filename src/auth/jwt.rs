use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::errors::{ServiceError, ServiceResult, DomainError};
use crate::types::UserRole;
use std::sync::OnceLock;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub refresh_exp: Option<i64>,
}

// JWT secret, provided once through initialize()
static JWT_SECRET: OnceLock<String> = OnceLock::new();

/// Token type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token (short-lived)
    Access,
    /// Refresh token (long-lived)
    Refresh,
}

/// Initialize JWT module with secret
pub fn initialize(secret: &str) {
    JWT_SECRET.get_or_init(|| secret.to_string());
}

/// Get JWT secret
fn get_secret() -> ServiceResult<&'static str> {
    JWT_SECRET.get()
        .map(|s| s.as_str())
        .ok_or_else(|| ServiceError::Configuration("JWT secret not initialized".to_string()))
}

/// Generate a JWT token
pub fn generate_token(
    user_id: &Uuid,
    role: &UserRole,
    token_type: TokenType,
) -> ServiceResult<(String, DateTime<Utc>)> {
    let secret = get_secret()?;

    let now = Utc::now();
    let token_id = Uuid::new_v4().to_string();

    // Access tokens expire in 15 minutes; refresh tokens carry a 30 day expiry
    let (expiry, refresh_exp) = match token_type {
        TokenType::Access => {
            let exp = now + chrono::Duration::minutes(15);
            (exp, None)
        },
        TokenType::Refresh => {
            let access_exp = now + chrono::Duration::minutes(15);
            let refresh_exp = now + chrono::Duration::days(30);
            (access_exp, Some(refresh_exp.timestamp()))
        }
    };

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        iat: now.timestamp(),
        exp: expiry.timestamp(),
        jti: token_id,
        refresh_exp,
    };

    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("JWT encoding error: {}", e))))?;

    Ok((token, expiry))
}

/// Verify a JWT token
pub fn verify_token(token: &str) -> ServiceResult<Claims> {
    let secret = get_secret()?;

    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::SessionExpired,
        _ => ServiceError::Authentication(format!("Invalid token: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Generate a refresh token
pub fn generate_refresh_token(
    user_id: &Uuid,
    role: &UserRole,
) -> ServiceResult<(String, DateTime<Utc>, DateTime<Utc>)> {
    let (token, access_expiry) = generate_token(user_id, role, TokenType::Refresh)?;

    let claims = verify_token(&token)?;
    let refresh_expiry = claims.refresh_exp
        .ok_or_else(|| ServiceError::Domain(DomainError::Internal("Refresh token missing refresh_exp".to_string())))?;

    let refresh_expiry_dt = DateTime::from_timestamp(refresh_expiry, 0)
        .ok_or_else(|| ServiceError::Domain(DomainError::Internal("Invalid refresh expiry timestamp".to_string())))?;

    Ok((token, access_expiry, refresh_expiry_dt))
}

/// Refresh an access token using a refresh token
pub fn refresh_access_token(refresh_token: &str) -> ServiceResult<(String, DateTime<Utc>)> {
    let claims = verify_token(refresh_token)?;

    if claims.refresh_exp.is_none() {
        return Err(ServiceError::Authentication("Not a refresh token".to_string()));
    }

    let now = Utc::now().timestamp();
    if let Some(refresh_exp) = claims.refresh_exp {
        if refresh_exp < now {
            return Err(ServiceError::SessionExpired);
        }
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ServiceError::Authentication("Invalid user ID in token".to_string()))?;

    let role = UserRole::from_str(&claims.role)
        .ok_or_else(|| ServiceError::Authentication("Invalid role in token".to_string()))?;

    generate_token(&user_id, &role, TokenType::Access)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_secret() {
        initialize("test-secret-for-jwt-module");
    }

    #[test]
    fn test_access_token_round_trip() {
        init_secret();
        let user_id = Uuid::new_v4();
        let (token, _expiry) = generate_token(&user_id, &UserRole::Admin, TokenType::Access).unwrap();

        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "admin");
        assert!(claims.refresh_exp.is_none());
    }

    #[test]
    fn test_refresh_token_yields_new_access_token() {
        init_secret();
        let user_id = Uuid::new_v4();
        let (refresh_token, _, _) = generate_refresh_token(&user_id, &UserRole::DataEntry).unwrap();

        let (access_token, _) = refresh_access_token(&refresh_token).unwrap();
        let claims = verify_token(&access_token).unwrap();
        assert_eq!(claims.role, "data_entry");
        assert!(claims.refresh_exp.is_none());
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        init_secret();
        assert!(verify_token("not-a-token").is_err());
    }
}
