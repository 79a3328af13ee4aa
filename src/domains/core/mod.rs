pub mod repository;

// Re-export the traits shared by every domain repository
pub use repository::{Repository, FindById, Deletable};
