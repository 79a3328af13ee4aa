use serde::{Deserialize, Serialize};

// Re-export UserRole and Permission from the permission module
pub use crate::domains::permission::{UserRole, Permission};

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl PaginationParams {
    /// Offset of the first row for the current page
    pub fn offset(&self) -> u64 {
        let page = self.page.max(1);
        (page as u64 - 1) * self.per_page as u64
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let total_pages = (total as f64 / params.per_page as f64).ceil() as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }
}
