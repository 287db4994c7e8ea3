pub mod identity;
pub mod llm;

pub use identity::IdentityToolkitVerifier;
pub use llm::OpenAiGenerator;
