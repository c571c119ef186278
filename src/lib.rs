pub mod config;
pub mod flashcards;

pub use config::{ConfigError, StudyConfig};
pub use flashcards::{FlashcardError, Rating, StudyService};
