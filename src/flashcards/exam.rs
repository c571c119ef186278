//! Exam prioritization
//!
//! Cards linked to an upcoming exam get priority during a window before it.
//! The window widens with the amount of material, up to 30 days.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::MS_PER_DAY;
use super::models::Exam;

const BASE_PERIOD_DAYS: f64 = 3.0;
const DAYS_PER_CARD: f64 = 0.05;
const MAX_PERIOD_DAYS: i64 = 30;

/// Days before an exam during which its cards are prioritized
pub fn retrievability_period_days(card_count: i64) -> i64 {
    let count = card_count.max(0) as f64;
    ((BASE_PERIOD_DAYS + count * DAYS_PER_CARD).round() as i64).min(MAX_PERIOD_DAYS)
}

pub fn is_in_retrievability_period(exam_at: DateTime<Utc>, card_count: i64, now: DateTime<Utc>) -> bool {
    ExamWindow::new(exam_at, card_count).contains(now)
}

/// Whole days until the exam, rounded up; negative once it has passed
pub fn days_until(exam_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let diff = (exam_at - now).num_milliseconds();
    -(-diff).div_euclid(MS_PER_DAY)
}

/// `[period_start, exam_at)` for one exam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamWindow {
    pub period_start: DateTime<Utc>,
    pub exam_at: DateTime<Utc>,
    pub period_days: i64,
}

impl ExamWindow {
    pub fn new(exam_at: DateTime<Utc>, card_count: i64) -> Self {
        let period_days = retrievability_period_days(card_count);
        Self {
            period_start: exam_at - Duration::days(period_days),
            exam_at,
            period_days,
        }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.period_start && now < self.exam_at
    }
}

/// Documents of every exam whose window contains `now`
///
/// `card_count` gives the number of reviewable cards for an exam.
pub fn prioritized_documents<F>(exams: &[Exam], now: DateTime<Utc>, card_count: F) -> HashSet<Uuid>
where
    F: Fn(&Exam) -> i64,
{
    let mut documents = HashSet::new();
    for exam in exams.iter().filter(|e| !e.archived) {
        let window = ExamWindow::new(exam.exam_at, card_count(exam));
        if window.contains(now) {
            log::debug!(
                "Exam {} in its {}-day window, prioritizing {} documents",
                exam.id,
                window.period_days,
                exam.linked_document_ids.len()
            );
            documents.extend(exam.linked_document_ids.iter().copied());
        }
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn exam_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_period_days() {
        assert_eq!(retrievability_period_days(0), 3);
        assert_eq!(retrievability_period_days(20), 4);
        assert_eq!(retrievability_period_days(100), 8);
        assert_eq!(retrievability_period_days(500), 28);
        assert_eq!(retrievability_period_days(540), 30);
        assert_eq!(retrievability_period_days(100_000), 30);
        assert_eq!(retrievability_period_days(-50), 3);
    }

    #[test]
    fn test_period_never_exceeds_cap() {
        for count in (0..5_000).step_by(7) {
            assert!(retrievability_period_days(count) <= 30);
        }
        assert!(retrievability_period_days(i64::MAX) <= 30);
    }

    #[test]
    fn test_window_bounds() {
        let exam = exam_time();
        // 100 cards -> 8 days
        assert!(is_in_retrievability_period(exam, 100, exam - Duration::days(8)));
        assert!(is_in_retrievability_period(exam, 100, exam - Duration::milliseconds(1)));
        assert!(!is_in_retrievability_period(exam, 100, exam));
        assert!(!is_in_retrievability_period(exam, 100, exam - Duration::days(8) - Duration::milliseconds(1)));
    }

    #[test]
    fn test_days_until() {
        let exam = exam_time();
        assert_eq!(days_until(exam, exam), 0);
        assert_eq!(days_until(exam, exam - Duration::hours(1)), 1);
        assert_eq!(days_until(exam, exam - Duration::days(3)), 3);
        assert_eq!(days_until(exam, exam - Duration::days(3) - Duration::hours(2)), 4);
        assert_eq!(days_until(exam, exam + Duration::hours(1)), 0);
        assert_eq!(days_until(exam, exam + Duration::days(2)), -2);
        assert_eq!(days_until(exam, exam + Duration::days(2) + Duration::hours(5)), -2);
    }

    #[test]
    fn test_prioritized_documents() {
        let owner = Uuid::new_v4();
        let near_doc = Uuid::new_v4();
        let far_doc = Uuid::new_v4();
        let now = exam_time() - Duration::days(2);

        let near = Exam::new(owner, "Near".to_string(), exam_time(), vec![near_doc]);
        let far = Exam::new(owner, "Far".to_string(), exam_time() + Duration::days(60), vec![far_doc]);
        let mut archived = Exam::new(owner, "Old".to_string(), exam_time(), vec![Uuid::new_v4()]);
        archived.archived = true;

        let docs = prioritized_documents(&[near, far, archived], now, |_| 20);
        assert_eq!(docs.len(), 1);
        assert!(docs.contains(&near_doc));
    }
}
