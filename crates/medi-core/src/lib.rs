pub mod case;
pub mod error;
pub mod flashcard;
pub mod gamification;
pub mod models;
pub mod quiz;
pub mod rating;
pub mod scheduling;
pub mod stats;
pub mod testutil;
pub mod traits;
pub mod tutor;
pub mod upload;
pub mod user;

pub use error::AppError;
pub use models::{Difficulty, compute_hash};
pub use stats::{StatsCache, UserStats};
pub use traits::{IdentityVerifier, TextGenerator};
pub use user::{Role, User};
