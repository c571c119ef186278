//! Review processing
//!
//! Applies a rating to a stored card, persists the new memory state and
//! appends the review log. Reviews of one card are serialized through a
//! per-card guard because FSRS transitions do not commute.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::algorithm::Scheduler;
use super::error::{FlashcardError, Result};
use super::models::{CardState, Rating, ReviewLog, ReviewSummary};
use super::store::RecordStore;

pub struct ReviewProcessor {
    store: Arc<dyn RecordStore>,
    scheduler: Scheduler,
    card_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ReviewProcessor {
    pub fn new(store: Arc<dyn RecordStore>, scheduler: Scheduler) -> Self {
        Self {
            store,
            scheduler,
            card_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the card's guard
    ///
    /// The guard is dropped from the map once no other caller holds it.
    pub(crate) fn with_card_lock<T>(&self, card_id: Uuid, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.lock_map().entry(card_id).or_default().clone();
        let result = {
            let _guard = lock_ignoring_poison(&lock);
            f()
        };

        let mut locks = self.lock_map();
        drop(lock);
        if locks.get(&card_id).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(&card_id);
        }
        result
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Mutex<()>>>> {
        self.card_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn owned_card(&self, owner_id: Uuid, card_id: Uuid) -> Result<CardState> {
        let card = self
            .store
            .get_card(card_id)?
            .ok_or(FlashcardError::CardNotFound(card_id))?;
        if card.owner_id != owner_id {
            return Err(FlashcardError::Forbidden { card_id });
        }
        Ok(card)
    }

    /// Rate a card and persist the result
    pub fn review(&self, owner_id: Uuid, card_id: Uuid, rating: Rating, now: DateTime<Utc>) -> Result<ReviewSummary> {
        self.with_card_lock(card_id, || self.review_locked(owner_id, card_id, rating, now))
    }

    fn review_locked(&self, owner_id: Uuid, card_id: Uuid, rating: Rating, now: DateTime<Utc>) -> Result<ReviewSummary> {
        let previous = self.owned_card(owner_id, card_id)?;
        let outcome = self.scheduler.apply_review(&previous.memory, rating, now);

        let mut updated = previous.clone();
        updated.memory = outcome.state;
        let log = ReviewLog::new(&updated, outcome.record);

        self.store.put_card(&updated)?;
        if let Err(e) = self.store.append_review_log(&log) {
            // Keep card and history consistent
            if let Err(restore) = self.store.put_card(&previous) {
                log::warn!("Failed to restore card {} after log write error: {}", card_id, restore);
            }
            return Err(e);
        }

        log::info!(
            "Reviewed card {} with rating {}: {} -> {}, next due {}",
            card_id,
            rating.value(),
            previous.memory.status,
            updated.memory.status,
            updated.memory.due
        );

        Ok(ReviewSummary {
            card_id,
            next_due: updated.memory.due,
            scheduled_days: updated.memory.scheduled_days,
            status: updated.memory.status,
            log_id: log.id,
            previous,
        })
    }

    /// Restore the snapshot taken before the latest review and drop its log
    ///
    /// "Latest" follows the order reviews were recorded, not their
    /// timestamps. Fails with `Conflict` when `log_id` is no longer the
    /// card's latest log.
    pub fn undo(&self, owner_id: Uuid, card_id: Uuid, snapshot: &CardState, log_id: Uuid) -> Result<()> {
        self.with_card_lock(card_id, || self.undo_locked(owner_id, card_id, snapshot, log_id))
    }

    fn undo_locked(&self, owner_id: Uuid, card_id: Uuid, snapshot: &CardState, log_id: Uuid) -> Result<()> {
        let current = self.owned_card(owner_id, card_id)?;
        if snapshot.id != card_id {
            return Err(FlashcardError::InvalidArgument(format!(
                "snapshot is for card {}, not {}",
                snapshot.id, card_id
            )));
        }
        if snapshot.owner_id != current.owner_id {
            return Err(FlashcardError::InvalidArgument(
                "snapshot owner does not match the card".to_string(),
            ));
        }

        let logs = self.store.list_card_review_logs(card_id)?;
        let target = logs
            .iter()
            .find(|l| l.id == log_id)
            .ok_or(FlashcardError::ReviewLogNotFound(log_id))?;

        // Ties only come from logs written before `reps` was recorded
        if let Some(latest) = logs.iter().max_by_key(|l| l.record.reps) {
            if latest.id != log_id {
                return Err(FlashcardError::Conflict(format!(
                    "review {} is newer than {} for card {}",
                    latest.id, log_id, card_id
                )));
            }
        }
        if target.record.reps.saturating_add(1) != current.memory.reps {
            return Err(FlashcardError::Conflict(format!(
                "card {} has changed since review {}",
                card_id, log_id
            )));
        }
        if snapshot.memory.reps != target.record.reps {
            return Err(FlashcardError::InvalidArgument(format!(
                "snapshot does not match the state before review {}",
                log_id
            )));
        }

        self.store.put_card(snapshot)?;
        if let Err(e) = self.store.delete_review_log(log_id) {
            if let Err(restore) = self.store.put_card(&current) {
                log::warn!("Failed to restore card {} after undo error: {}", card_id, restore);
            }
            return Err(e);
        }

        log::info!("Undid review {} of card {}", log_id, card_id);
        Ok(())
    }

    /// Delete a card and its logs without racing a review of it
    pub(crate) fn delete_card(&self, card_id: Uuid) -> Result<()> {
        self.with_card_lock(card_id, || self.store.delete_card(card_id))
    }
}

fn lock_ignoring_poison(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::error::ErrorKind;
    use crate::flashcards::models::{CardSide, CardStatus};
    use crate::flashcards::store::{FileStore, MemoryStore};
    use chrono::{Duration, TimeZone};
    use std::thread;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, ReviewProcessor, CardState) {
        let store = Arc::new(MemoryStore::new());
        let card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk-1".to_string(), CardSide::Forward, now());
        store.put_card(&card).unwrap();
        let processor = ReviewProcessor::new(store.clone(), Scheduler::default());
        (store, processor, card)
    }

    #[test]
    fn test_review_persists_state_and_log() {
        let (store, processor, card) = setup();

        let summary = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();
        assert_eq!(summary.card_id, card.id);
        assert_eq!(summary.status, CardStatus::Learning);
        assert_eq!(summary.previous, card);

        let stored = store.get_card(card.id).unwrap().unwrap();
        assert_eq!(stored.memory.reps, 1);
        assert_eq!(stored.memory.due, summary.next_due);
        assert_eq!(stored.memory.last_review, Some(now()));

        let logs = store.list_card_review_logs(card.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, summary.log_id);
        assert_eq!(logs[0].record.rating, Rating::Good);
        assert_eq!(logs[0].record.status, CardStatus::New);
    }

    #[test]
    fn test_review_errors() {
        let (_store, processor, card) = setup();

        let missing = processor.review(card.owner_id, Uuid::new_v4(), Rating::Good, now());
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);

        let stranger = processor.review(Uuid::new_v4(), card.id, Rating::Good, now());
        assert_eq!(stranger.unwrap_err().kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_undo_restores_snapshot() {
        let (store, processor, card) = setup();

        let summary = processor.review(card.owner_id, card.id, Rating::Easy, now()).unwrap();
        processor
            .undo(card.owner_id, card.id, &summary.previous, summary.log_id)
            .unwrap();

        assert_eq!(store.get_card(card.id).unwrap().unwrap(), card);
        assert!(store.list_card_review_logs(card.id).unwrap().is_empty());
    }

    #[test]
    fn test_undo_rejects_stale_log() {
        let (store, processor, card) = setup();

        let first = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();
        let second = processor
            .review(card.owner_id, card.id, Rating::Good, now() + Duration::minutes(10))
            .unwrap();

        let err = processor
            .undo(card.owner_id, card.id, &first.previous, first.log_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.list_card_review_logs(card.id).unwrap().len(), 2);

        processor
            .undo(card.owner_id, card.id, &second.previous, second.log_id)
            .unwrap();
        let restored = store.get_card(card.id).unwrap().unwrap();
        assert_eq!(restored.memory.reps, 1);

        // The older review is now the latest and can be undone too
        processor
            .undo(card.owner_id, card.id, &first.previous, first.log_id)
            .unwrap();
        assert_eq!(store.get_card(card.id).unwrap().unwrap(), card);
    }

    #[test]
    fn test_undo_follows_write_order_not_timestamps() {
        let (store, processor, card) = setup();

        // Recorded first but stamped later, e.g. a client with a fast clock
        let first = processor
            .review(card.owner_id, card.id, Rating::Good, now() + Duration::minutes(10))
            .unwrap();
        let second = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();

        let err = processor
            .undo(card.owner_id, card.id, &first.previous, first.log_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.get_card(card.id).unwrap().unwrap().memory.reps, 2);

        processor
            .undo(card.owner_id, card.id, &second.previous, second.log_id)
            .unwrap();
        let logs = store.list_card_review_logs(card.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, first.log_id);
        assert_eq!(store.get_card(card.id).unwrap().unwrap(), second.previous);
    }

    #[test]
    fn test_undo_rejects_mismatched_snapshot() {
        let (store, processor, card) = setup();
        let first = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();
        let second = processor
            .review(card.owner_id, card.id, Rating::Good, now() + Duration::minutes(1))
            .unwrap();

        // Snapshot from the first review paired with the second log
        let err = processor
            .undo(card.owner_id, card.id, &first.previous, second.log_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.list_card_review_logs(card.id).unwrap().len(), 2);
    }

    #[test]
    fn test_card_locks_are_released() {
        let (_store, processor, card) = setup();

        let summary = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();
        assert!(processor.lock_map().is_empty());

        let _ = processor.review(card.owner_id, Uuid::new_v4(), Rating::Good, now());
        assert!(processor.lock_map().is_empty());

        processor
            .undo(card.owner_id, card.id, &summary.previous, summary.log_id)
            .unwrap();
        assert!(processor.lock_map().is_empty());
    }

    #[test]
    fn test_undo_validation() {
        let (_store, processor, card) = setup();
        let summary = processor.review(card.owner_id, card.id, Rating::Good, now()).unwrap();

        let err = processor
            .undo(Uuid::new_v4(), card.id, &summary.previous, summary.log_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let mut other = summary.previous.clone();
        other.id = Uuid::new_v4();
        let err = processor.undo(card.owner_id, card.id, &other, summary.log_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = processor
            .undo(card.owner_id, card.id, &summary.previous, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, FlashcardError::ReviewLogNotFound(_)));
    }

    #[test]
    fn test_concurrent_reviews_are_serialized() {
        let (store, processor, card) = setup();
        let processor = Arc::new(processor);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let processor = processor.clone();
                let owner = card.owner_id;
                let id = card.id;
                thread::spawn(move || {
                    processor
                        .review(owner, id, Rating::Good, now() + Duration::minutes(i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = store.get_card(card.id).unwrap().unwrap();
        assert_eq!(stored.memory.reps, 8);
        assert_eq!(store.list_card_review_logs(card.id).unwrap().len(), 8);
        assert!(processor.lock_map().is_empty());
    }

    #[test]
    fn test_review_with_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp_dir.path().to_path_buf()));
        store.init().unwrap();

        let card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk-9".to_string(), CardSide::Reverse, now());
        store.put_card(&card).unwrap();

        let processor = ReviewProcessor::new(store.clone(), Scheduler::default());
        let summary = processor.review(card.owner_id, card.id, Rating::Again, now()).unwrap();

        let reopened = FileStore::new(temp_dir.path().to_path_buf());
        let stored = reopened.get_card(card.id).unwrap().unwrap();
        assert_eq!(stored.memory.status, summary.status);
        assert_eq!(reopened.list_card_review_logs(card.id).unwrap()[0].id, summary.log_id);
    }
}
