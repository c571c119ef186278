//! Data models for the flashcard scheduling engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::FlashcardError;

/// Type of flashcard content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    /// Simple question and answer
    #[default]
    Basic,
    /// Fill-in-the-blank style
    Cloze,
    /// Can be reviewed in both directions
    Reversible,
}

/// Which side of a content unit a card asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardSide {
    /// Front is the prompt, back is the answer
    Forward,
    /// Back is the prompt, front is the answer
    Reverse,
}

/// Directions a flashcard block is enabled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CardDirection {
    #[default]
    Forward,
    Reverse,
    Bidirectional,
    /// Flashcard turned off for this block; its memory states are removed
    Disabled,
}

impl CardDirection {
    /// Sides that need a memory state for this direction
    pub fn sides(self) -> &'static [CardSide] {
        match self {
            Self::Forward => &[CardSide::Forward],
            Self::Reverse => &[CardSide::Reverse],
            Self::Bidirectional => &[CardSide::Forward, CardSide::Reverse],
            Self::Disabled => &[],
        }
    }

    pub fn enables(self, side: CardSide) -> bool {
        self.sides().contains(&side)
    }
}

/// A flashcard-tagged block inside a document, owned by the block store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUnit {
    pub id: String,
    pub document_id: Uuid,
    #[serde(default)]
    pub card_direction: CardDirection,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
}

impl ContentUnit {
    pub fn new(document_id: Uuid, id: impl Into<String>, front: String, back: String) -> Self {
        Self {
            id: id.into(),
            document_id,
            card_direction: CardDirection::default(),
            card_type: CardType::default(),
            front,
            back,
        }
    }

    pub fn with_direction(mut self, direction: CardDirection) -> Self {
        self.card_direction = direction;
        self
    }
}

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CardStatus {
    /// Never reviewed
    #[default]
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Learner's answer to a card (1-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Good and Easy count as successful recall for retention purposes
    pub fn is_success(self) -> bool {
        self >= Rating::Good
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl TryFrom<u8> for Rating {
    type Error = FlashcardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(FlashcardError::InvalidArgument(format!(
                "rating must be between 1 and 4, got {}",
                other
            ))),
        }
    }
}

/// Forgetting-curve memory values for one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Days for retrievability to decay to the target retention
    #[serde(default)]
    pub stability: f64,
    /// 1-10 once reviewed, 0 for new cards
    #[serde(default)]
    pub difficulty: f64,
    /// When the card is next due
    pub due: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    /// Completed reviews
    #[serde(default)]
    pub reps: u32,
    /// Again ratings given from review or relearning
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub status: CardStatus,
    /// Interval chosen at the last review, in whole days
    #[serde(default)]
    pub scheduled_days: i64,
    /// Whole days between the last two reviews
    #[serde(default)]
    pub elapsed_days: i64,
    /// Index into the (re)learning steps
    #[serde(default)]
    pub learning_steps: u32,
}

impl MemoryState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            stability: 0.0,
            difficulty: 0.0,
            due: now,
            last_review: None,
            reps: 0,
            lapses: 0,
            status: CardStatus::New,
            scheduled_days: 0,
            elapsed_days: 0,
            learning_steps: 0,
        }
    }
}

/// Persisted memory state for one (content unit, side) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub document_id: Uuid,
    pub block_id: String,
    pub side: CardSide,
    #[serde(flatten)]
    pub memory: MemoryState,
    #[serde(default)]
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl CardState {
    pub fn new(owner_id: Uuid, document_id: Uuid, block_id: String, side: CardSide, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            document_id,
            block_id,
            side,
            memory: MemoryState::new(now),
            suspended: false,
            created_at: now,
        }
    }

    /// Memory state for one side of a content unit
    pub fn for_unit(owner_id: Uuid, unit: &ContentUnit, side: CardSide, now: DateTime<Utc>) -> Self {
        Self::new(owner_id, unit.document_id, unit.id.clone(), side, now)
    }

    pub fn status(&self) -> CardStatus {
        self.memory.status
    }

    pub fn is_new(&self) -> bool {
        self.memory.status == CardStatus::New
    }

    /// Check if the card is due for review
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.memory.due
    }
}

/// What a single review changed, as recorded in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub rating: Rating,
    /// Completed reviews before this one; orders a card's logs by write
    #[serde(default)]
    pub reps: u32,
    /// Status before the review
    pub status: CardStatus,
    /// Interval that had been scheduled before the review
    pub scheduled_days: i64,
    /// Whole days since the previous review
    pub elapsed_days: i64,
    /// Stability at review time
    pub stability: f64,
    /// Difficulty at review time
    pub difficulty: f64,
    /// Due date the card had when it was reviewed
    pub due: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// Append-only review log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: Uuid,
    pub card_id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub record: ReviewRecord,
}

impl ReviewLog {
    pub fn new(card: &CardState, record: ReviewRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id: card.id,
            owner_id: card.owner_id,
            record,
        }
    }

    pub fn reviewed_at(&self) -> DateTime<Utc> {
        self.record.reviewed_at
    }
}

/// A scheduled exam linked to one or more documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub exam_at: DateTime<Utc>,
    #[serde(default)]
    pub linked_document_ids: Vec<Uuid>,
    #[serde(default)]
    pub archived: bool,
}

impl Exam {
    pub fn new(owner_id: Uuid, title: String, exam_at: DateTime<Utc>, linked_document_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title,
            exam_at,
            linked_document_ids,
            archived: false,
        }
    }

    /// Not archived and still in the future
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.archived && self.exam_at > now
    }
}

/// Result of reviewing a card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub card_id: Uuid,
    pub next_due: DateTime<Utc>,
    pub scheduled_days: i64,
    pub status: CardStatus,
    pub log_id: Uuid,
    /// Card as it was before the review, for undo
    pub previous: CardState,
}

/// Statistics for an owner's cards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub due_cards: usize,
    pub suspended_cards: usize,
    pub reviews_today: usize,
    pub correct_today: usize,
    pub streak_days: i32,
}

/// A card flagged by the leech detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeechCard {
    pub card: CardState,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<f64>,
}

/// Leech counts for an owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeechStats {
    pub total_leeches: usize,
    pub suspended_leeches: usize,
    pub by_lapses: usize,
    pub by_retention: usize,
}
