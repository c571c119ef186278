//! Flashcard scheduling engine
//!
//! This module provides:
//! - FSRS-6 memory model (retrievability, review transitions, interval preview)
//! - Leech detection and exam prioritization
//! - Study queue assembly and review processing
//! - The `RecordStore` seam with in-memory and JSON-file stores

pub mod algorithm;
pub mod error;
pub mod exam;
pub mod leech;
pub mod models;
pub mod queue;
pub mod review;
pub mod service;
pub mod store;

pub use algorithm::{format_interval, IntervalPreview, Scheduler};
pub use error::{ErrorKind, FlashcardError, Result};
pub use models::*;
pub use queue::{LearnSession, QueueBucket, QueueConfig, QueueEntry, QueueScope};
pub use service::{CardPreview, StudyService, SyncReport};
pub use store::{FileStore, MemoryStore, RecordStore};
