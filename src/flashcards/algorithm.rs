//! FSRS-6 Spaced Repetition Algorithm
//!
//! Predicts recall probability from a card's stability and difficulty and
//! picks the next review date so that retrievability has decayed to the
//! desired retention (0.9 by default) when the card comes due.
//!
//! Ratings (1-4):
//! - 1 Again: forgot the answer
//! - 2 Hard: recalled with serious difficulty
//! - 3 Good: recalled after hesitation
//! - 4 Easy: recalled effortlessly
//!
//! Forgetting curve: `R(t, S) = (1 + F * t / S) ^ -w20`, with `F` chosen so
//! that `R(S, S) = 0.9`.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::models::{CardStatus, MemoryState, Rating, ReviewRecord};
use crate::config::SchedulerConfig;

/// Published FSRS-6 default parameters
pub const DEFAULT_WEIGHTS: [f64; 21] = [
    0.212, 1.2931, 2.3065, 8.2956, 6.4133, 0.8334, 3.0194, 0.001, 1.8722, 0.1666, 0.796, 1.4835,
    0.0614, 0.2629, 1.6483, 0.6014, 1.8729, 0.5425, 0.0912, 0.0658, 0.1542,
];

pub const DEFAULT_DESIRED_RETENTION: f64 = 0.9;
pub const DEFAULT_MAXIMUM_INTERVAL: i64 = 730;

const MIN_STABILITY: f64 = 0.001;
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;
/// Step used when a configured step list is empty
const FALLBACK_STEP_MINUTES: i64 = 1;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Fuzz ranges as (start, end, factor) in days
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

/// Result of applying one rating
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub state: MemoryState,
    pub record: ReviewRecord,
}

/// Interval each rating would produce, in days (fractional for learning steps)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalPreview {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl IntervalPreview {
    pub fn get(&self, rating: Rating) -> f64 {
        match rating {
            Rating::Again => self.again,
            Rating::Hard => self.hard,
            Rating::Good => self.good,
            Rating::Easy => self.easy,
        }
    }

    /// Labels for Again, Hard, Good, Easy
    pub fn labels(&self) -> [String; 4] {
        Rating::ALL.map(|rating| format_interval(self.get(rating)))
    }
}

/// FSRS-6 scheduler with its parameters
#[derive(Debug, Clone)]
pub struct Scheduler {
    weights: [f64; 21],
    desired_retention: f64,
    maximum_interval: i64,
    enable_fuzz: bool,
    learning_steps: Vec<Duration>,
    relearning_steps: Vec<Duration>,
    decay: f64,
    factor: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let weights = DEFAULT_WEIGHTS;
        let decay = -weights[20];
        let factor = 0.9f64.powf(1.0 / decay) - 1.0;
        // A card always has at least one step to land on after Again
        let to_steps = |minutes: &[u32]| {
            let steps: Vec<Duration> = minutes.iter().map(|m| Duration::minutes(i64::from(*m))).collect();
            if steps.is_empty() {
                vec![Duration::minutes(FALLBACK_STEP_MINUTES)]
            } else {
                steps
            }
        };

        Self {
            weights,
            desired_retention: config.desired_retention,
            maximum_interval: config.maximum_interval.max(1),
            enable_fuzz: config.enable_fuzz,
            learning_steps: to_steps(&config.learning_steps),
            relearning_steps: to_steps(&config.relearning_steps),
            decay,
            factor,
        }
    }

    /// Same parameters with fuzzing switched off
    pub fn without_fuzz(mut self) -> Self {
        self.enable_fuzz = false;
        self
    }

    pub fn maximum_interval(&self) -> i64 {
        self.maximum_interval
    }

    /// Memory state for a card that has never been reviewed
    pub fn create_initial(&self, now: DateTime<Utc>) -> MemoryState {
        MemoryState::new(now)
    }

    /// Probability of recalling the card at `now`, always within [0, 1]
    pub fn retrievability(&self, state: &MemoryState, now: DateTime<Utc>) -> f64 {
        if state.status == CardStatus::New || state.stability <= 0.0 {
            return 0.0;
        }
        let Some(last_review) = state.last_review else {
            return 0.0;
        };

        let elapsed = ((now - last_review).num_milliseconds() as f64 / MS_PER_DAY as f64).max(0.0);
        let r = self.forgetting_curve(elapsed, state.stability);
        if r.is_finite() {
            r.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Apply a rating and compute the card's next memory state
    pub fn apply_review(&self, state: &MemoryState, rating: Rating, now: DateTime<Utc>) -> ReviewOutcome {
        let elapsed_days = match state.last_review {
            Some(last_review) => ((now - last_review).num_milliseconds() / MS_PER_DAY).max(0),
            None => 0,
        };

        let record = ReviewRecord {
            rating,
            reps: state.reps,
            status: state.status,
            scheduled_days: state.scheduled_days,
            elapsed_days,
            stability: state.stability,
            difficulty: state.difficulty,
            due: state.due,
            reviewed_at: now,
        };

        let mut rng = fuzz_rng(state, now);
        let mut next = state.clone();
        next.elapsed_days = elapsed_days;
        next.last_review = Some(now);
        next.reps = state.reps.saturating_add(1);

        match state.status {
            CardStatus::New => {
                next.stability = self.init_stability(rating);
                next.difficulty = self.init_difficulty(rating).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
                next.learning_steps = 0;
                self.step_or_graduate(&mut next, CardStatus::Learning, rating, true, now, &mut rng);
            }
            CardStatus::Learning | CardStatus::Relearning => {
                next.difficulty = self.next_difficulty(state.difficulty, rating);
                next.stability = if elapsed_days == 0 {
                    self.next_short_term_stability(state.stability, rating)
                } else {
                    let r = self.forgetting_curve(elapsed_days as f64, state.stability);
                    match rating {
                        Rating::Again => self.next_forget_stability(state.difficulty, state.stability, r),
                        _ => self.next_recall_stability(state.difficulty, state.stability, r, rating),
                    }
                };
                if rating == Rating::Again && state.status == CardStatus::Relearning {
                    next.lapses = state.lapses.saturating_add(1);
                }
                self.step_or_graduate(&mut next, state.status, rating, false, now, &mut rng);
            }
            CardStatus::Review => self.schedule_review(state, &mut next, rating, elapsed_days, now, &mut rng),
        }

        ReviewOutcome { state: next, record }
    }

    /// Run every rating against the state without changing it
    pub fn preview_intervals(&self, state: &MemoryState, now: DateTime<Utc>) -> IntervalPreview {
        let days = |rating: Rating| {
            let outcome = self.apply_review(state, rating, now);
            (outcome.state.due - now).num_milliseconds() as f64 / MS_PER_DAY as f64
        };

        IntervalPreview {
            again: days(Rating::Again),
            hard: days(Rating::Hard),
            good: days(Rating::Good),
            easy: days(Rating::Easy),
        }
    }

    fn schedule_review(
        &self,
        state: &MemoryState,
        next: &mut MemoryState,
        rating: Rating,
        elapsed_days: i64,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) {
        let (s, d) = (state.stability, state.difficulty);
        let r = self.forgetting_curve(elapsed_days as f64, s);
        next.difficulty = self.next_difficulty(d, rating);

        if rating == Rating::Again {
            next.stability = self.next_forget_stability(d, s, r);
            next.lapses = state.lapses.saturating_add(1);
            next.learning_steps = 0;
            next.status = CardStatus::Relearning;
            next.scheduled_days = 0;
            next.due = now + step_at(&self.relearning_steps, 0);
            return;
        }

        let hard_s = self.next_recall_stability(d, s, r, Rating::Hard);
        let good_s = self.next_recall_stability(d, s, r, Rating::Good);
        let easy_s = self.next_recall_stability(d, s, r, Rating::Easy);

        let mut hard = self.next_interval(hard_s, elapsed_days, rng);
        let mut good = self.next_interval(good_s, elapsed_days, rng);
        let mut easy = self.next_interval(easy_s, elapsed_days, rng);
        hard = hard.min(good);
        good = good.max(hard + 1);
        easy = easy.max(good + 1);

        let (stability, interval) = match rating {
            Rating::Hard => (hard_s, hard),
            Rating::Good => (good_s, good),
            _ => (easy_s, easy),
        };
        next.stability = stability;
        next.learning_steps = 0;
        set_review_interval(next, interval.min(self.maximum_interval), now);
    }

    /// Move through (re)learning steps, graduating to review when they run out
    ///
    /// A new card only skips learning on Easy; Good on a single-step
    /// schedule still lands on that step first.
    fn step_or_graduate(
        &self,
        next: &mut MemoryState,
        status: CardStatus,
        rating: Rating,
        first_review: bool,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) {
        let steps = if status == CardStatus::Relearning {
            &self.relearning_steps
        } else {
            &self.learning_steps
        };

        let current = (next.learning_steps as usize).min(steps.len().saturating_sub(1));
        let delay = match rating {
            Rating::Again => Some((0, step_at(steps, 0))),
            Rating::Hard => Some((current, hard_step_delay(steps, current))),
            Rating::Good if current + 1 < steps.len() => Some((current + 1, step_at(steps, current + 1))),
            Rating::Good if first_review => Some((current, step_at(steps, current))),
            Rating::Good | Rating::Easy => None,
        };

        match delay {
            Some((index, delay)) => {
                next.status = status;
                next.learning_steps = index as u32;
                next.scheduled_days = 0;
                next.due = now + delay;
            }
            None => self.graduate(next, now, rng),
        }
    }

    fn graduate(&self, next: &mut MemoryState, now: DateTime<Utc>, rng: &mut StdRng) {
        let interval = self.next_interval(next.stability, next.elapsed_days, rng);
        next.learning_steps = 0;
        set_review_interval(next, interval, now);
    }

    fn forgetting_curve(&self, elapsed_days: f64, stability: f64) -> f64 {
        if stability <= 0.0 {
            return 0.0;
        }
        (1.0 + self.factor * elapsed_days / stability).powf(self.decay)
    }

    /// Whole-day interval for a stability, fuzzed and clamped to [1, maximum]
    fn next_interval(&self, stability: f64, elapsed_days: i64, rng: &mut StdRng) -> i64 {
        let raw = stability / self.factor * (self.desired_retention.powf(1.0 / self.decay) - 1.0);
        let raw = if raw.is_finite() { raw.max(1.0) } else { 1.0 };
        self.apply_fuzz(raw, elapsed_days, rng)
    }

    fn apply_fuzz(&self, interval: f64, elapsed_days: i64, rng: &mut StdRng) -> i64 {
        let max = self.maximum_interval;
        if !self.enable_fuzz || interval < 2.5 {
            return (interval.round() as i64).clamp(1, max);
        }

        let fuzz: f64 = rng.gen();
        let delta = fuzz_delta(interval);
        let mut min_ivl = ((interval - delta).round() as i64).max(2);
        let max_ivl = ((interval + delta).round() as i64).min(max);
        if interval > elapsed_days as f64 {
            min_ivl = min_ivl.max(elapsed_days + 1);
        }
        min_ivl = min_ivl.min(max_ivl);

        let fuzzed = (fuzz * (max_ivl - min_ivl + 1) as f64 + min_ivl as f64).floor() as i64;
        fuzzed.clamp(1, max)
    }

    fn init_stability(&self, rating: Rating) -> f64 {
        self.weights[rating.value() as usize - 1].max(0.1)
    }

    /// Unclamped; callers clamp except for the mean-reversion target
    fn init_difficulty(&self, rating: Rating) -> f64 {
        let g = f64::from(rating.value());
        self.weights[4] - (self.weights[5] * (g - 1.0)).exp() + 1.0
    }

    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let g = f64::from(rating.value());
        let delta = -self.weights[6] * (g - 3.0);
        let damped = difficulty + delta * (10.0 - difficulty) / 9.0;
        let w7 = self.weights[7];
        let reverted = w7 * self.init_difficulty(Rating::Easy) + (1.0 - w7) * damped;
        reverted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn next_recall_stability(&self, difficulty: f64, stability: f64, r: f64, rating: Rating) -> f64 {
        let w = &self.weights;
        let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
        let growth = w[8].exp()
            * (11.0 - difficulty)
            * stability.powf(-w[9])
            * ((w[10] * (1.0 - r)).exp() - 1.0)
            * hard_penalty
            * easy_bonus;
        clamp_stability(stability * (1.0 + growth))
    }

    fn next_forget_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        let w = &self.weights;
        let forgotten = w[11]
            * difficulty.powf(-w[12])
            * ((stability + 1.0).powf(w[13]) - 1.0)
            * (w[14] * (1.0 - r)).exp();
        let ceiling = stability / (w[17] * w[18]).exp();
        clamp_stability(forgotten.min(ceiling))
    }

    fn next_short_term_stability(&self, stability: f64, rating: Rating) -> f64 {
        let w = &self.weights;
        let g = f64::from(rating.value());
        let mut increase = (w[17] * (g - 3.0 + w[18])).exp() * stability.max(MIN_STABILITY).powf(-w[19]);
        if rating >= Rating::Good {
            increase = increase.max(1.0);
        }
        clamp_stability(stability * increase)
    }
}

fn clamp_stability(stability: f64) -> f64 {
    if stability.is_finite() {
        stability.max(MIN_STABILITY)
    } else {
        MIN_STABILITY
    }
}

fn set_review_interval(next: &mut MemoryState, interval: i64, now: DateTime<Utc>) {
    next.status = CardStatus::Review;
    next.scheduled_days = interval;
    next.due = now + Duration::days(interval);
}

fn step_at(steps: &[Duration], index: usize) -> Duration {
    steps
        .get(index)
        .copied()
        .unwrap_or_else(|| Duration::minutes(FALLBACK_STEP_MINUTES))
}

fn hard_step_delay(steps: &[Duration], current: usize) -> Duration {
    if steps.len() <= 1 {
        let step = step_at(steps, 0);
        (step * 3 / 2).min(step + Duration::days(1))
    } else if current == 0 {
        (steps[0] + steps[1]) / 2
    } else {
        step_at(steps, current)
    }
}

fn fuzz_delta(interval: f64) -> f64 {
    FUZZ_RANGES.iter().fold(1.0, |delta, (start, end, factor)| {
        delta + factor * (interval.min(*end) - start).max(0.0)
    })
}

/// Seeded from the card and review time so previews match the real review
fn fuzz_rng(state: &MemoryState, now: DateTime<Utc>) -> StdRng {
    let seed = (now.timestamp_millis() as u64)
        ^ u64::from(state.reps).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (state.stability * state.difficulty).to_bits();
    StdRng::seed_from_u64(seed)
}

/// Memory state for a never-reviewed card
pub fn create_initial(now: DateTime<Utc>) -> MemoryState {
    Scheduler::default().create_initial(now)
}

/// Apply a rating with the default parameters
pub fn apply_review(state: &MemoryState, rating: Rating, now: DateTime<Utc>) -> ReviewOutcome {
    Scheduler::default().apply_review(state, rating, now)
}

/// Recall probability with the default parameters
pub fn retrievability(state: &MemoryState, now: DateTime<Utc>) -> f64 {
    Scheduler::default().retrievability(state, now)
}

/// Interval preview with the default parameters
pub fn preview_intervals(state: &MemoryState, now: DateTime<Utc>) -> IntervalPreview {
    Scheduler::default().preview_intervals(state, now)
}

/// Format an interval in days to a human-readable string
///
/// Minutes below an hour, hours below a day, days below a week, weeks below
/// 30 days, months below a year, then years to one decimal place.
pub fn format_interval(days: f64) -> String {
    let days = if days.is_finite() { days.max(0.0) } else { 0.0 };
    let minutes = (days * 1440.0).round();

    if minutes < 1.0 {
        "now".to_string()
    } else if minutes < 60.0 {
        format!("{}m", minutes as i64)
    } else if minutes < 1440.0 {
        format!("{}h", ((minutes / 60.0).round() as i64).min(23))
    } else if days < 7.0 {
        format!("{}d", (days.round() as i64).clamp(1, 6))
    } else if days < 30.0 {
        format!("{}w", (days / 7.0).round() as i64)
    } else if days < 365.0 {
        format!("{}mo", ((days / 30.0).round() as i64).min(12))
    } else {
        let years = format!("{:.1}", days / 365.0);
        format!("{}y", years.trim_end_matches(".0"))
    }
}
