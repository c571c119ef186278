//! Study queue assembly
//!
//! One builder covers every session flavor: the global exam-aware learn
//! session, a session scoped to one document, and the plain due/new lists.
//! Cards come out as `exam due ++ regular due ++ exam new ++ regular new`,
//! and no card appears in more than one bucket.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::Scheduler;
use super::error::Result;
use super::exam::prioritized_documents;
use super::models::{CardState, ContentUnit};
use super::store::RecordStore;
use crate::config::SessionConfig;

/// Which cards a queue draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueScope {
    Global,
    Document { document_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    pub scope: QueueScope,
    /// Split out cards linked to exams inside their window (global scope only)
    pub exam_aware: bool,
    pub new_limit: usize,
    pub review_limit: usize,
    pub exam_limit: usize,
}

impl QueueConfig {
    /// Global session with exam prioritization
    pub fn learn_session(limits: &SessionConfig) -> Self {
        Self {
            scope: QueueScope::Global,
            exam_aware: true,
            new_limit: limits.new_limit,
            review_limit: limits.review_limit,
            exam_limit: limits.exam_limit,
        }
    }

    /// Session restricted to one document, ordered by due date
    pub fn document_session(document_id: Uuid, limits: &SessionConfig) -> Self {
        Self {
            scope: QueueScope::Document { document_id },
            exam_aware: false,
            ..Self::learn_session(limits)
        }
    }

    /// Only due cards, no exam split
    pub fn due_only(scope: QueueScope, review_limit: usize) -> Self {
        Self {
            scope,
            exam_aware: false,
            new_limit: 0,
            review_limit,
            exam_limit: 0,
        }
    }

    /// Only new cards, no exam split
    pub fn new_only(scope: QueueScope, new_limit: usize) -> Self {
        Self {
            scope,
            exam_aware: false,
            new_limit,
            review_limit: 0,
            exam_limit: 0,
        }
    }

    fn splits_exams(&self) -> bool {
        self.exam_aware && self.scope == QueueScope::Global
    }

    /// The global exam-aware session leaves regular reviews uncapped
    fn caps_regular_due(&self) -> bool {
        !self.splits_exams()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueBucket {
    ExamDue,
    RegularDue,
    ExamNew,
    RegularNew,
}

/// A card ready to be studied
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub card: CardState,
    pub unit: ContentUnit,
    pub retrievability: f64,
    pub bucket: QueueBucket,
}

/// Ordered study queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnSession {
    pub entries: Vec<QueueEntry>,
    #[serde(default)]
    pub exam_document_ids: Vec<Uuid>,
}

impl LearnSession {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bucket(&self, bucket: QueueBucket) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().filter(move |e| e.bucket == bucket)
    }

    pub fn count(&self, bucket: QueueBucket) -> usize {
        self.bucket(bucket).count()
    }

    pub fn card_ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.card.id).collect()
    }
}

/// Card paired with its content unit and current recall probability
struct Candidate {
    card: CardState,
    unit: ContentUnit,
    retrievability: f64,
}

impl Candidate {
    fn into_entry(self, bucket: QueueBucket) -> QueueEntry {
        QueueEntry {
            card: self.card,
            unit: self.unit,
            retrievability: self.retrievability,
            bucket,
        }
    }
}

pub struct QueueBuilder<'a> {
    store: &'a dyn RecordStore,
    scheduler: &'a Scheduler,
}

impl<'a> QueueBuilder<'a> {
    pub fn new(store: &'a dyn RecordStore, scheduler: &'a Scheduler) -> Self {
        Self { store, scheduler }
    }

    pub fn build(&self, owner_id: Uuid, config: &QueueConfig, now: DateTime<Utc>) -> Result<LearnSession> {
        let mut cards = self.store.list_cards_by_owner(owner_id)?;
        cards.retain(|c| !c.suspended);
        if let QueueScope::Document { document_id } = config.scope {
            cards.retain(|c| c.document_id == document_id);
        }

        let candidates = self.attach_units(cards, now);

        let exam_docs = if config.splits_exams() {
            self.exam_documents(owner_id, &candidates, now)?
        } else {
            HashSet::new()
        };
        let in_exam = |c: &Candidate| exam_docs.contains(&c.card.document_id);

        let (new_cards, reviewed): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| c.card.is_new());

        let (mut exam_due, rest): (Vec<Candidate>, Vec<Candidate>) = reviewed.into_iter().partition(|c| in_exam(c));
        sort_by_retrievability(&mut exam_due);
        // Exam cards past the cap still count as ordinary reviews
        let overflow = exam_due.split_off(config.exam_limit.min(exam_due.len()));

        let mut regular_due: Vec<Candidate> = rest
            .into_iter()
            .chain(overflow)
            .filter(|c| c.card.is_due(now))
            .collect();
        if config.scope == QueueScope::Global {
            sort_by_retrievability(&mut regular_due);
        } else {
            sort_by_due(&mut regular_due);
        }
        if config.caps_regular_due() {
            regular_due.truncate(config.review_limit);
        }

        let (mut exam_new, mut regular_new): (Vec<Candidate>, Vec<Candidate>) =
            new_cards.into_iter().partition(|c| in_exam(c));
        sort_by_due(&mut exam_new);
        exam_new.truncate(config.new_limit);
        sort_by_due(&mut regular_new);
        regular_new.truncate(config.new_limit.saturating_sub(exam_new.len()));

        log::debug!(
            "Queue for {}: {} exam due, {} due, {} exam new, {} new",
            owner_id,
            exam_due.len(),
            regular_due.len(),
            exam_new.len(),
            regular_new.len()
        );

        let buckets = [
            (QueueBucket::ExamDue, exam_due),
            (QueueBucket::RegularDue, regular_due),
            (QueueBucket::ExamNew, exam_new),
            (QueueBucket::RegularNew, regular_new),
        ];

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (bucket, candidates) in buckets {
            for candidate in candidates {
                if seen.insert(candidate.card.id) {
                    entries.push(candidate.into_entry(bucket));
                }
            }
        }

        let mut exam_document_ids: Vec<Uuid> = exam_docs.into_iter().collect();
        exam_document_ids.sort();

        Ok(LearnSession {
            entries,
            exam_document_ids,
        })
    }

    /// Pair cards with their content units, dropping cards whose unit is gone
    /// or no longer enables their side
    fn attach_units(&self, cards: Vec<CardState>, now: DateTime<Utc>) -> Vec<Candidate> {
        let mut units_by_doc: HashMap<Uuid, HashMap<String, ContentUnit>> = HashMap::new();
        for document_id in cards.iter().map(|c| c.document_id).collect::<HashSet<_>>() {
            let units = match self.store.list_reviewable_content_units(document_id) {
                Ok(units) => units,
                Err(e) => {
                    log::warn!("Skipping cards of document {}: {}", document_id, e);
                    Vec::new()
                }
            };
            units_by_doc.insert(
                document_id,
                units.into_iter().map(|u| (u.id.clone(), u)).collect(),
            );
        }

        cards
            .into_iter()
            .filter_map(|card| {
                let unit = units_by_doc
                    .get(&card.document_id)
                    .and_then(|units| units.get(&card.block_id))
                    .filter(|unit| unit.card_direction.enables(card.side))
                    .cloned();
                match unit {
                    Some(unit) => {
                        let retrievability = self.scheduler.retrievability(&card.memory, now);
                        Some(Candidate {
                            card,
                            unit,
                            retrievability,
                        })
                    }
                    None => {
                        log::warn!("Dropping card {} from queue: content unit {} unavailable", card.id, card.block_id);
                        None
                    }
                }
            })
            .collect()
    }

    fn exam_documents(&self, owner_id: Uuid, candidates: &[Candidate], now: DateTime<Utc>) -> Result<HashSet<Uuid>> {
        let exams = self.store.list_active_exams(owner_id, now)?;
        if exams.is_empty() {
            return Ok(HashSet::new());
        }

        let mut per_document: HashMap<Uuid, i64> = HashMap::new();
        for candidate in candidates {
            *per_document.entry(candidate.card.document_id).or_default() += 1;
        }

        Ok(prioritized_documents(&exams, now, |exam| {
            exam.linked_document_ids
                .iter()
                .collect::<HashSet<_>>()
                .into_iter()
                .map(|doc| per_document.get(doc).copied().unwrap_or(0))
                .sum()
        }))
    }
}

fn sort_by_retrievability(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.retrievability
            .total_cmp(&b.retrievability)
            .then_with(|| compare_due(a, b))
    });
}

fn sort_by_due(candidates: &mut [Candidate]) {
    candidates.sort_by(compare_due);
}

fn compare_due(a: &Candidate, b: &Candidate) -> Ordering {
    a.card
        .memory
        .due
        .cmp(&b.card.memory.due)
        .then_with(|| a.card.created_at.cmp(&b.card.created_at))
        .then_with(|| a.card.id.cmp(&b.card.id))
}
