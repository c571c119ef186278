//! Error type for flashcard scheduling operations

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum FlashcardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    #[error("Review log not found: {0}")]
    ReviewLogNotFound(Uuid),

    #[error("Card {card_id} belongs to another user")]
    Forbidden { card_id: Uuid },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Coarse category for surfacing errors to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidArgument,
    Conflict,
    Storage,
}

impl FlashcardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CardNotFound(_) | Self::ReviewLogNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Io(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlashcardError>;
