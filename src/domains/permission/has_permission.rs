use serde::{Deserialize, Serialize};

// --- User Role Definition ---

/// UserRole enum for authorization in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Superadmin,
    Admin,
    DataEntry,
    Consultor,
}

// --- Permission Enum Definition ---

/// Permission enum representing individual permissions in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    // User management
    ManageUsers,
    ViewUsers,
    CreateUsers,
    EditUsers,
    DeleteUsers,

    // Study (questionnaire/variable) management
    ManageStudies,
    ViewStudies,
    CreateStudies,
    EditStudies,
    DeleteStudies,

    // Participant management
    ManageParticipants,
    ViewParticipants,
    CreateParticipants,
    EditParticipants,
    DeleteParticipants,

    // Data management
    UploadData,
    ViewData,
    EditData,
    DeleteData,
    DownloadData,
    ImportData,
    ExportData,

    // Reports
    ViewReports,
    GenerateReports,

    // System
    SystemSettings,
    ViewAuditLogs,
}

// --- UserRole Implementation ---

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Superadmin => "superadmin",
            UserRole::Admin => "admin",
            UserRole::DataEntry => "data_entry",
            UserRole::Consultor => "consultor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "superadmin" => Some(UserRole::Superadmin),
            "admin" => Some(UserRole::Admin),
            "data_entry" => Some(UserRole::DataEntry),
            "consultor" => Some(UserRole::Consultor),
            _ => None,
        }
    }

    /// Check if the role grants a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            // Superadmin has every permission
            UserRole::Superadmin => true,
            UserRole::Admin => {
                match permission {
                    // User administration and system settings stay with superadmin
                    Permission::ManageUsers
                    | Permission::CreateUsers
                    | Permission::EditUsers
                    | Permission::DeleteUsers
                    | Permission::SystemSettings => false,

                    // Admin may still see who the users are
                    Permission::ViewUsers => true,

                    // Everything else is allowed for Admin
                    _ => true,
                }
            }
            UserRole::DataEntry => {
                matches!(
                    permission,
                    Permission::ViewStudies
                        | Permission::ViewParticipants
                        | Permission::UploadData
                        | Permission::ViewData
                        | Permission::DownloadData
                        | Permission::ImportData
                        | Permission::ExportData
                )
            }
            UserRole::Consultor => {
                matches!(
                    permission,
                    Permission::ViewStudies
                        | Permission::ViewParticipants
                        | Permission::ViewData
                        | Permission::DownloadData
                        | Permission::ExportData
                        | Permission::ViewReports
                )
            }
        }
    }

    /// Check if the role grants all of the specified permissions
    pub fn has_permissions(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(*p))
    }
}

// --- Permission Implementation (String Conversions & Listing) ---

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ViewUsers => "view_users",
            Permission::CreateUsers => "create_users",
            Permission::EditUsers => "edit_users",
            Permission::DeleteUsers => "delete_users",
            Permission::ManageStudies => "manage_studies",
            Permission::ViewStudies => "view_studies",
            Permission::CreateStudies => "create_studies",
            Permission::EditStudies => "edit_studies",
            Permission::DeleteStudies => "delete_studies",
            Permission::ManageParticipants => "manage_participants",
            Permission::ViewParticipants => "view_participants",
            Permission::CreateParticipants => "create_participants",
            Permission::EditParticipants => "edit_participants",
            Permission::DeleteParticipants => "delete_participants",
            Permission::UploadData => "upload_data",
            Permission::ViewData => "view_data",
            Permission::EditData => "edit_data",
            Permission::DeleteData => "delete_data",
            Permission::DownloadData => "download_data",
            Permission::ImportData => "import_data",
            Permission::ExportData => "export_data",
            Permission::ViewReports => "view_reports",
            Permission::GenerateReports => "generate_reports",
            Permission::SystemSettings => "system_settings",
            Permission::ViewAuditLogs => "view_audit_logs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manage_users" => Some(Permission::ManageUsers),
            "view_users" => Some(Permission::ViewUsers),
            "create_users" => Some(Permission::CreateUsers),
            "edit_users" => Some(Permission::EditUsers),
            "delete_users" => Some(Permission::DeleteUsers),
            "manage_studies" => Some(Permission::ManageStudies),
            "view_studies" => Some(Permission::ViewStudies),
            "create_studies" => Some(Permission::CreateStudies),
            "edit_studies" => Some(Permission::EditStudies),
            "delete_studies" => Some(Permission::DeleteStudies),
            "manage_participants" => Some(Permission::ManageParticipants),
            "view_participants" => Some(Permission::ViewParticipants),
            "create_participants" => Some(Permission::CreateParticipants),
            "edit_participants" => Some(Permission::EditParticipants),
            "delete_participants" => Some(Permission::DeleteParticipants),
            "upload_data" => Some(Permission::UploadData),
            "view_data" => Some(Permission::ViewData),
            "edit_data" => Some(Permission::EditData),
            "delete_data" => Some(Permission::DeleteData),
            "download_data" => Some(Permission::DownloadData),
            "import_data" => Some(Permission::ImportData),
            "export_data" => Some(Permission::ExportData),
            "view_reports" => Some(Permission::ViewReports),
            "generate_reports" => Some(Permission::GenerateReports),
            "system_settings" => Some(Permission::SystemSettings),
            "view_audit_logs" => Some(Permission::ViewAuditLogs),
            _ => None,
        }
    }

    /// Get all permissions in the system
    pub fn all() -> Vec<Permission> {
        vec![
            Permission::ManageUsers, Permission::ViewUsers, Permission::CreateUsers,
            Permission::EditUsers, Permission::DeleteUsers,
            Permission::ManageStudies, Permission::ViewStudies, Permission::CreateStudies,
            Permission::EditStudies, Permission::DeleteStudies,
            Permission::ManageParticipants, Permission::ViewParticipants,
            Permission::CreateParticipants, Permission::EditParticipants,
            Permission::DeleteParticipants,
            Permission::UploadData, Permission::ViewData, Permission::EditData,
            Permission::DeleteData, Permission::DownloadData, Permission::ImportData,
            Permission::ExportData,
            Permission::ViewReports, Permission::GenerateReports,
            Permission::SystemSettings, Permission::ViewAuditLogs,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superadmin_has_every_permission() {
        for permission in Permission::all() {
            assert!(UserRole::Superadmin.has_permission(permission));
        }
    }

    #[test]
    fn test_admin_cannot_manage_users() {
        assert!(!UserRole::Admin.has_permission(Permission::ManageUsers));
        assert!(!UserRole::Admin.has_permission(Permission::CreateUsers));
        assert!(!UserRole::Admin.has_permission(Permission::EditUsers));
        assert!(!UserRole::Admin.has_permission(Permission::DeleteUsers));
        assert!(!UserRole::Admin.has_permission(Permission::SystemSettings));

        assert!(UserRole::Admin.has_permission(Permission::ViewUsers));
        assert!(UserRole::Admin.has_permission(Permission::ManageStudies));
        assert!(UserRole::Admin.has_permission(Permission::ImportData));
        assert!(UserRole::Admin.has_permission(Permission::ViewAuditLogs));
    }

    #[test]
    fn test_data_entry_is_limited_to_data_work() {
        assert!(UserRole::DataEntry.has_permission(Permission::UploadData));
        assert!(UserRole::DataEntry.has_permission(Permission::ImportData));
        assert!(UserRole::DataEntry.has_permission(Permission::ViewStudies));

        assert!(!UserRole::DataEntry.has_permission(Permission::ManageUsers));
        assert!(!UserRole::DataEntry.has_permission(Permission::ManageStudies));
        assert!(!UserRole::DataEntry.has_permission(Permission::EditData));
        assert!(!UserRole::DataEntry.has_permission(Permission::ViewReports));
    }

    #[test]
    fn test_consultor_is_read_only() {
        assert!(UserRole::Consultor.has_permission(Permission::ViewData));
        assert!(UserRole::Consultor.has_permission(Permission::DownloadData));
        assert!(UserRole::Consultor.has_permission(Permission::ViewReports));

        assert!(!UserRole::Consultor.has_permission(Permission::UploadData));
        assert!(!UserRole::Consultor.has_permission(Permission::ImportData));
        assert!(!UserRole::Consultor.has_permission(Permission::ManageStudies));
        assert!(!UserRole::Consultor.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_role_string_round_trip() {
        for role in [UserRole::Superadmin, UserRole::Admin, UserRole::DataEntry, UserRole::Consultor] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("root"), None);
    }
}
