//! Leech detection
//!
//! A leech is a card the learner keeps failing. Detection is a signal only;
//! suspending the card is a separate, explicit operation.

use super::models::{CardState, ReviewLog};
use crate::config::LeechConfig;

/// Thresholds for leech classification
#[derive(Debug, Clone, PartialEq)]
pub struct LeechDetector {
    lapse_threshold: u32,
    rep_threshold: u32,
    retention_threshold: f64,
    min_logs: usize,
}

impl Default for LeechDetector {
    fn default() -> Self {
        Self::from_config(&LeechConfig::default())
    }
}

impl LeechDetector {
    pub fn from_config(config: &LeechConfig) -> Self {
        Self {
            lapse_threshold: config.lapse_threshold,
            rep_threshold: config.rep_threshold,
            retention_threshold: config.retention_threshold,
            min_logs: config.min_logs,
        }
    }

    /// Percentage of logs rated Good or Easy, or None below the minimum sample
    pub fn retention_rate(&self, logs: &[ReviewLog]) -> Option<f64> {
        if logs.len() < self.min_logs.max(1) {
            return None;
        }
        let successes = logs.iter().filter(|log| log.record.rating.is_success()).count();
        Some(successes as f64 / logs.len() as f64 * 100.0)
    }

    pub fn is_leech(&self, card: &CardState, retention: Option<f64>) -> bool {
        self.fails_by_lapses(card) || self.fails_by_retention(card, retention)
    }

    /// Explanation for a leech; the lapse count wins when both apply
    pub fn leech_reason(&self, card: &CardState, retention: Option<f64>) -> Option<String> {
        if self.fails_by_lapses(card) {
            return Some(format!("Forgotten {} times", card.memory.lapses));
        }
        match retention {
            Some(rate) if self.fails_by_retention(card, retention) => Some(format!(
                "Only {:.0}% retention after {} reviews",
                rate, card.memory.reps
            )),
            _ => None,
        }
    }

    pub(crate) fn fails_by_lapses(&self, card: &CardState) -> bool {
        card.memory.lapses > self.lapse_threshold
    }

    pub(crate) fn fails_by_retention(&self, card: &CardState, retention: Option<f64>) -> bool {
        card.memory.reps > self.rep_threshold
            && retention.map_or(false, |rate| rate < self.retention_threshold)
    }
}

/// Retention percentage with the default thresholds
pub fn retention_rate(logs: &[ReviewLog]) -> Option<f64> {
    LeechDetector::default().retention_rate(logs)
}

pub fn is_leech(card: &CardState, retention: Option<f64>) -> bool {
    LeechDetector::default().is_leech(card, retention)
}

pub fn leech_reason(card: &CardState, retention: Option<f64>) -> Option<String> {
    LeechDetector::default().leech_reason(card, retention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{CardSide, CardStatus, Rating, ReviewRecord};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn card(reps: u32, lapses: u32) -> CardState {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk".to_string(), CardSide::Forward, now);
        card.memory.reps = reps;
        card.memory.lapses = lapses;
        card.memory.status = CardStatus::Review;
        card
    }

    fn logs(card: &CardState, ratings: &[Rating]) -> Vec<ReviewLog> {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        ratings
            .iter()
            .map(|rating| {
                ReviewLog::new(
                    card,
                    ReviewRecord {
                        rating: *rating,
                        reps: card.memory.reps,
                        status: CardStatus::Review,
                        scheduled_days: 1,
                        elapsed_days: 1,
                        stability: 1.0,
                        difficulty: 5.0,
                        due: now,
                        reviewed_at: now,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_retention_needs_five_logs() {
        let c = card(3, 0);
        assert_eq!(retention_rate(&logs(&c, &[Rating::Good; 4])), None);
        assert_eq!(retention_rate(&[]), None);

        let sample = logs(&c, &[Rating::Good, Rating::Easy, Rating::Hard, Rating::Again, Rating::Good]);
        assert_eq!(retention_rate(&sample), Some(60.0));
    }

    #[test]
    fn test_lapses_make_a_leech() {
        let c = card(0, 6);
        assert!(is_leech(&c, None));
        assert!(is_leech(&c, Some(100.0)));
        assert!(!is_leech(&card(0, 5), None));
    }

    #[test]
    fn test_low_retention_makes_a_leech() {
        let c = card(11, 0);
        let ratings = [
            Rating::Again,
            Rating::Again,
            Rating::Good,
            Rating::Again,
            Rating::Hard,
            Rating::Again,
            Rating::Good,
            Rating::Again,
            Rating::Again,
            Rating::Hard,
            Rating::Good,
            Rating::Again,
            Rating::Again,
            Rating::Again,
            Rating::Again,
            Rating::Hard,
            Rating::Again,
            Rating::Good,
            Rating::Again,
            Rating::Good,
        ];
        let retention = retention_rate(&logs(&c, &ratings));
        assert_eq!(retention, Some(25.0));
        assert!(is_leech(&c, retention));
        assert!(is_leech(&c, Some(35.0)));

        // Needs more than ten reps
        assert!(!is_leech(&card(10, 0), Some(35.0)));
        assert!(!is_leech(&c, Some(40.0)));
    }

    #[test]
    fn test_small_sample_never_leeches_by_retention() {
        let c = card(11, 0);
        let retention = retention_rate(&logs(&c, &[Rating::Again; 3]));
        assert_eq!(retention, None);
        assert!(!is_leech(&c, retention));
        assert_eq!(leech_reason(&c, retention), None);
    }

    #[test]
    fn test_reason_prefers_lapses() {
        let c = card(20, 7);
        let reason = leech_reason(&c, Some(10.0)).unwrap();
        assert_eq!(reason, "Forgotten 7 times");

        let c = card(12, 1);
        let reason = leech_reason(&c, Some(33.3)).unwrap();
        assert_eq!(reason, "Only 33% retention after 12 reviews");
    }

    #[test]
    fn test_custom_thresholds() {
        let detector = LeechDetector::from_config(&LeechConfig {
            lapse_threshold: 2,
            min_logs: 2,
            ..LeechConfig::default()
        });
        assert!(detector.is_leech(&card(0, 3), None));

        let c = card(1, 0);
        assert_eq!(detector.retention_rate(&logs(&c, &[Rating::Good, Rating::Again])), Some(50.0));
    }
}
