mod has_permission;

pub use has_permission::{UserRole, Permission};
