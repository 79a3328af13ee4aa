pub mod types;
pub mod repository;
pub mod service;

// Re-export main items for other domains to use
pub use types::Participant;
pub use service::ParticipantService;
pub use repository::ParticipantRepository;
