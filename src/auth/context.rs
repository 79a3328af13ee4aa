use uuid::Uuid;
use crate::types::{UserRole, Permission};
use crate::errors::ServiceError;

/// Represents the authentication context for the current operation
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The ID of the authenticated user
    pub user_id: Uuid,

    /// The role of the authenticated user
    pub role: UserRole,
}

impl AuthContext {
    /// Create a new authentication context
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Create a new authentication context for internal system operations
    pub fn internal_system_context() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: UserRole::Superadmin,
        }
    }

    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Check if the user holds any of the given roles
    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }

    /// Authorize a specific permission, returning an error if not allowed
    pub fn authorize(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "User does not have permission: {:?}",
                permission
            )))
        }
    }

    /// Authorize multiple permissions, requiring all of them
    pub fn authorize_all(&self, permissions: &[Permission]) -> Result<(), ServiceError> {
        if self.role.has_permissions(permissions) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "User does not have all required permissions".to_string()
            ))
        }
    }

    /// Authorize entry to a view restricted to the given roles. Denial is
    /// immediate; there is no partial access.
    pub fn authorize_any_role(&self, roles: &[UserRole]) -> Result<(), ServiceError> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "This view requires one of the roles: {}",
                roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
            )))
        }
    }

    /// Verify user is a superadmin
    pub fn authorize_superadmin(&self) -> Result<(), ServiceError> {
        if matches!(self.role, UserRole::Superadmin) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "This action requires superadmin privileges".to_string()
            ))
        }
    }

    /// For operations restricted to the user's own records
    pub fn authorize_self_or_superadmin(&self, resource_owner_id: &Uuid) -> Result<(), ServiceError> {
        if &self.user_id == resource_owner_id || matches!(self.role, UserRole::Superadmin) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "You do not have permission to access this resource".to_string()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role)
    }

    #[test]
    fn test_view_gates_match_role_tiers() {
        // User management is superadmin-only
        assert!(ctx(UserRole::Superadmin).authorize(Permission::ManageUsers).is_ok());
        assert!(ctx(UserRole::Admin).authorize(Permission::ManageUsers).is_err());
        assert!(ctx(UserRole::DataEntry).authorize(Permission::ManageUsers).is_err());
        assert!(ctx(UserRole::Consultor).authorize(Permission::ManageUsers).is_err());

        // Questionnaire/variable management is superadmin or admin
        assert!(ctx(UserRole::Superadmin).authorize(Permission::ManageStudies).is_ok());
        assert!(ctx(UserRole::Admin).authorize(Permission::ManageStudies).is_ok());
        assert!(ctx(UserRole::DataEntry).authorize(Permission::ManageStudies).is_err());
        assert!(ctx(UserRole::Consultor).authorize(Permission::ManageStudies).is_err());
    }

    #[test]
    fn test_has_any_role() {
        let admin = ctx(UserRole::Admin);
        assert!(admin.has_any_role(&[UserRole::Superadmin, UserRole::Admin]));
        assert!(!admin.has_any_role(&[UserRole::Superadmin]));
        assert!(admin.authorize_any_role(&[UserRole::Superadmin, UserRole::Admin]).is_ok());
        assert!(admin.authorize_any_role(&[UserRole::Superadmin]).is_err());
    }

    #[test]
    fn test_authorize_self_or_superadmin() {
        let user = ctx(UserRole::Consultor);
        assert!(user.authorize_self_or_superadmin(&user.user_id).is_ok());
        assert!(user.authorize_self_or_superadmin(&Uuid::new_v4()).is_err());
        assert!(ctx(UserRole::Superadmin).authorize_self_or_superadmin(&Uuid::new_v4()).is_ok());
    }
}
