pub mod types;
pub mod repository;
pub mod service;

// Re-export main items for other domains to use
pub use types::Questionnaire;
pub use service::QuestionnaireService;
pub use repository::QuestionnaireRepository;
