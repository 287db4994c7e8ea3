pub mod case_repository;
pub mod config;
pub mod database;
pub mod flashcard_repository;
pub mod quiz_repository;
pub mod stats_repository;
pub mod upload_repository;
pub mod user_repository;

pub use case_repository::{CaseRepository, RatingOutcome};
pub use config::DatabaseConfig;
pub use database::Database;
pub use flashcard_repository::FlashcardRepository;
pub use quiz_repository::QuizRepository;
pub use stats_repository::StatsRepository;
pub use upload_repository::UploadRepository;
pub use user_repository::{ProgressOutcome, UserRepository};
