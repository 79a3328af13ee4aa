pub mod types;
pub mod import;
pub mod repository;
pub mod service;

// Re-export main items for other domains to use
pub use types::{Variable, VariableType};
pub use service::VariableService;
pub use repository::VariableRepository;
