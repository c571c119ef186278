//! Study service: the call surface over a record store
//!
//! Every method takes the caller's identity and, where time matters, an
//! explicit `now`. The service keeps no session state of its own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::{IntervalPreview, Scheduler};
use super::error::{FlashcardError, Result};
use super::leech::LeechDetector;
use super::models::*;
use super::queue::{LearnSession, QueueBuilder, QueueConfig, QueueEntry, QueueScope};
use super::review::ReviewProcessor;
use super::store::RecordStore;
use crate::config::{SessionConfig, StudyConfig};

/// Interval preview for one card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPreview {
    pub card_id: Uuid,
    pub status: CardStatus,
    pub retrievability: f64,
    pub intervals: IntervalPreview,
    /// Again, Hard, Good, Easy
    pub labels: [String; 4],
}

/// Outcome of reconciling a document's cards with its content units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: usize,
    pub removed: usize,
}

pub struct StudyService {
    store: Arc<dyn RecordStore>,
    config: StudyConfig,
    scheduler: Scheduler,
    leech: LeechDetector,
    processor: ReviewProcessor,
}

impl StudyService {
    pub fn new(store: Arc<dyn RecordStore>, config: StudyConfig) -> Self {
        let scheduler = Scheduler::from_config(&config.scheduler);
        Self::with_scheduler(store, config, scheduler)
    }

    /// Use a specific scheduler instead of the configured one
    pub fn with_scheduler(store: Arc<dyn RecordStore>, config: StudyConfig, scheduler: Scheduler) -> Self {
        let leech = LeechDetector::from_config(&config.leech);
        let processor = ReviewProcessor::new(store.clone(), scheduler.clone());
        Self {
            store,
            config,
            scheduler,
            leech,
            processor,
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
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

    fn build(&self, owner_id: Uuid, config: &QueueConfig, now: DateTime<Utc>) -> Result<LearnSession> {
        QueueBuilder::new(self.store.as_ref(), &self.scheduler).build(owner_id, config, now)
    }

    // ===== Queues =====

    /// Exam-aware session across all of the owner's documents
    pub fn get_learn_session(&self, owner_id: Uuid, limits: &SessionConfig, now: DateTime<Utc>) -> Result<LearnSession> {
        self.build(owner_id, &QueueConfig::learn_session(limits), now)
    }

    /// Session for one document, due cards ordered by due date
    pub fn get_document_session(
        &self,
        owner_id: Uuid,
        document_id: Uuid,
        limits: &SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<LearnSession> {
        self.build(owner_id, &QueueConfig::document_session(document_id, limits), now)
    }

    pub fn get_due_cards(&self, owner_id: Uuid, scope: QueueScope, limit: usize, now: DateTime<Utc>) -> Result<Vec<QueueEntry>> {
        Ok(self.build(owner_id, &QueueConfig::due_only(scope, limit), now)?.entries)
    }

    pub fn get_new_cards(&self, owner_id: Uuid, scope: QueueScope, limit: usize, now: DateTime<Utc>) -> Result<Vec<QueueEntry>> {
        Ok(self.build(owner_id, &QueueConfig::new_only(scope, limit), now)?.entries)
    }

    // ===== Reviews =====

    /// Rate a card; `rating` must be 1-4
    pub fn review_card(&self, owner_id: Uuid, card_id: Uuid, rating: u8, now: DateTime<Utc>) -> Result<ReviewSummary> {
        let rating = Rating::try_from(rating)?;
        self.processor.review(owner_id, card_id, rating, now)
    }

    pub fn undo_review(&self, owner_id: Uuid, card_id: Uuid, snapshot: &CardState, log_id: Uuid) -> Result<()> {
        self.processor.undo(owner_id, card_id, snapshot, log_id)
    }

    pub fn preview_card(&self, owner_id: Uuid, card_id: Uuid, now: DateTime<Utc>) -> Result<CardPreview> {
        let card = self.owned_card(owner_id, card_id)?;
        let intervals = self.scheduler.preview_intervals(&card.memory, now);
        Ok(CardPreview {
            card_id,
            status: card.memory.status,
            retrievability: self.scheduler.retrievability(&card.memory, now),
            labels: intervals.labels(),
            intervals,
        })
    }

    /// Set or clear the suspended flag
    pub fn suspend_card(&self, owner_id: Uuid, card_id: Uuid, suspended: bool) -> Result<CardState> {
        self.processor.with_card_lock(card_id, || {
            let mut card = self.owned_card(owner_id, card_id)?;
            if card.suspended != suspended {
                card.suspended = suspended;
                self.store.put_card(&card)?;
                log::info!(
                    "Card {} {}",
                    card_id,
                    if suspended { "suspended" } else { "reactivated" }
                );
            }
            Ok(card)
        })
    }

    // ===== Leeches =====

    fn leech_logs(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<HashMap<Uuid, Vec<ReviewLog>>> {
        let since = now - Duration::days(self.config.leech.window_days.max(0));
        let mut by_card: HashMap<Uuid, Vec<ReviewLog>> = HashMap::new();
        for log in self.store.list_review_logs(owner_id, since)? {
            by_card.entry(log.card_id).or_default().push(log);
        }
        Ok(by_card)
    }

    /// Cards the learner keeps failing, worst first
    pub fn list_leech_cards(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Vec<LeechCard>> {
        let logs = self.leech_logs(owner_id, now)?;
        let mut leeches: Vec<LeechCard> = self
            .store
            .list_cards_by_owner(owner_id)?
            .into_iter()
            .filter_map(|card| {
                let retention = logs
                    .get(&card.id)
                    .and_then(|logs| self.leech.retention_rate(logs));
                let reason = self.leech.leech_reason(&card, retention)?;
                Some(LeechCard {
                    card,
                    reason,
                    retention,
                })
            })
            .collect();

        leeches.sort_by(|a, b| {
            b.card
                .memory
                .lapses
                .cmp(&a.card.memory.lapses)
                .then_with(|| a.retention.unwrap_or(100.0).total_cmp(&b.retention.unwrap_or(100.0)))
                .then_with(|| a.card.id.cmp(&b.card.id))
        });
        Ok(leeches)
    }

    pub fn get_leech_stats(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<LeechStats> {
        let mut stats = LeechStats::default();
        for leech in self.list_leech_cards(owner_id, now)? {
            stats.total_leeches += 1;
            if leech.card.suspended {
                stats.suspended_leeches += 1;
            }
            if self.leech.fails_by_lapses(&leech.card) {
                stats.by_lapses += 1;
            }
            if self.leech.fails_by_retention(&leech.card, leech.retention) {
                stats.by_retention += 1;
            }
        }
        Ok(stats)
    }

    // ===== Statistics =====

    pub fn get_review_stats(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<ReviewStats> {
        let cards = self.store.list_cards_by_owner(owner_id)?;

        let mut stats = ReviewStats {
            total_cards: cards.len(),
            ..ReviewStats::default()
        };

        for card in &cards {
            match card.memory.status {
                CardStatus::New => stats.new_cards += 1,
                CardStatus::Learning => stats.learning_cards += 1,
                CardStatus::Review | CardStatus::Relearning => stats.review_cards += 1,
            }
            if card.suspended {
                stats.suspended_cards += 1;
            } else if !card.is_new() && card.is_due(now) {
                stats.due_cards += 1;
            }
        }

        let today = now.date_naive();
        let start_of_today = today.and_hms_opt(0, 0, 0).map_or(now, |t| t.and_utc());
        let year_ago = now - Duration::days(366);
        let logs = self.store.list_review_logs(owner_id, year_ago)?;

        for log in logs.iter().filter(|l| l.reviewed_at() >= start_of_today) {
            stats.reviews_today += 1;
            if log.record.rating.is_success() {
                stats.correct_today += 1;
            }
        }

        let review_days: HashSet<NaiveDate> = logs.iter().map(|l| l.reviewed_at().date_naive()).collect();
        stats.streak_days = current_streak(&review_days, today);

        Ok(stats)
    }

    // ===== Maintenance =====

    /// Reconcile a document's cards with its reviewable content units
    ///
    /// Creates a new card for every enabled side without one and deletes
    /// cards for disabled sides or vanished units, logs included.
    pub fn sync_document_cards(&self, owner_id: Uuid, document_id: Uuid, now: DateTime<Utc>) -> Result<SyncReport> {
        let units = self.store.list_reviewable_content_units(document_id)?;
        let mut report = SyncReport::default();
        let mut live_blocks = HashSet::new();

        for unit in &units {
            live_blocks.insert(unit.id.as_str());
            let existing: Vec<CardState> = self
                .store
                .list_cards_by_content_unit(&unit.id)?
                .into_iter()
                .filter(|c| c.owner_id == owner_id && c.document_id == document_id)
                .collect();

            for card in existing.iter().filter(|c| !unit.card_direction.enables(c.side)) {
                self.processor.delete_card(card.id)?;
                report.removed += 1;
            }

            for side in unit.card_direction.sides() {
                if !existing.iter().any(|c| c.side == *side) {
                    let card = CardState::for_unit(owner_id, unit, *side, now);
                    self.store.put_card(&card)?;
                    report.created += 1;
                }
            }
        }

        for card in self.store.list_cards_by_owner(owner_id)? {
            if card.document_id == document_id && !live_blocks.contains(card.block_id.as_str()) {
                self.processor.delete_card(card.id)?;
                report.removed += 1;
            }
        }

        if report != SyncReport::default() {
            log::info!(
                "Synced document {}: {} cards created, {} removed",
                document_id,
                report.created,
                report.removed
            );
        }
        Ok(report)
    }

    /// Delete cards whose content unit is gone or disabled, one page at a time
    pub fn cleanup_orphans(&self, owner_id: Uuid) -> Result<usize> {
        let page_size = self.config.maintenance.page_size.max(1);
        let cards = self.store.list_cards_by_owner(owner_id)?;
        let mut units: HashMap<Uuid, HashMap<String, ContentUnit>> = HashMap::new();
        let mut removed = 0;

        for (page, chunk) in cards.chunks(page_size).enumerate() {
            let mut orphans = Vec::new();
            for card in chunk {
                if !units.contains_key(&card.document_id) {
                    let doc_units = self.store.list_reviewable_content_units(card.document_id)?;
                    units.insert(
                        card.document_id,
                        doc_units.into_iter().map(|u| (u.id.clone(), u)).collect(),
                    );
                }
                let alive = units
                    .get(&card.document_id)
                    .and_then(|doc_units| doc_units.get(&card.block_id))
                    .map_or(false, |unit| unit.card_direction.enables(card.side));
                if !alive {
                    orphans.push(card.id);
                }
            }

            for card_id in &orphans {
                self.processor.delete_card(*card_id)?;
            }
            log::debug!("Cleanup page {}: {} of {} cards removed", page, orphans.len(), chunk.len());
            removed += orphans.len();
        }

        if removed > 0 {
            log::info!("Removed {} orphaned cards for {}", removed, owner_id);
        }
        Ok(removed)
    }
}

/// Consecutive review days ending today, or yesterday if today has none yet
fn current_streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> i32 {
    let mut check_date = today;
    if !days.contains(&check_date) {
        check_date = check_date - Duration::days(1);
        if !days.contains(&check_date) {
            return 0;
        }
    }

    let mut streak = 0;
    while days.contains(&check_date) {
        streak += 1;
        check_date = check_date - Duration::days(1);
    }
    streak
}
