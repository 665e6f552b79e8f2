// src/scoring/aggregator.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::scoring::evaluator::{EvaluationItem, Verdict};

/// Subject label for questions that carry none.
pub const UNKNOWN_SUBJECT: &str = "Unknown";

/// Counts and marks for one group of items (or for all of them).
///
/// Marks are summed in whole cents, so the groups of a breakdown add up to
/// the overall totals exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub marks_awarded: f64,
    pub negative_awarded: f64,
    pub net_score: f64,
    pub max_score: f64,
    pub accuracy: f64,
    #[serde(skip)]
    awarded_cents: i64,
    #[serde(skip)]
    negative_cents: i64,
    #[serde(skip)]
    max_cents: i64,
}

impl Tally {
    fn record(&mut self, item: &EvaluationItem) {
        self.total += 1;
        match item.verdict {
            Verdict::Correct => self.correct += 1,
            Verdict::Wrong => self.wrong += 1,
            Verdict::Skipped => self.skipped += 1,
        }
        self.awarded_cents += to_cents(item.marks_awarded);
        self.negative_cents += to_cents(item.negative_awarded);
        self.max_cents += to_cents(item.marks);
    }

    /// Derives the dependent fields once all items are recorded.
    fn finish(mut self) -> Self {
        self.attempted = self.total - self.skipped;
        self.marks_awarded = from_cents(self.awarded_cents);
        self.negative_awarded = from_cents(self.negative_cents);
        self.net_score = from_cents(self.awarded_cents - self.negative_cents);
        self.max_score = from_cents(self.max_cents);
        self.accuracy = accuracy(self.correct, self.attempted);
        self
    }

    /// Net score in cents.
    pub fn net_cents(&self) -> i64 {
        self.awarded_cents - self.negative_cents
    }
}

fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    #[serde(flatten)]
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub totals: Tally,
    pub by_subject: Vec<GroupSummary>,
    pub by_type: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    /// Net score: marks awarded minus negative marks.
    pub score: f64,
    pub accuracy: f64,
    pub max_score: f64,
    pub breakdown: Breakdown,
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of attempted questions answered correctly; 0 when nothing was attempted.
pub fn accuracy(correct: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    round2(correct as f64 / attempted as f64 * 100.0)
}

fn subject_key(item: &EvaluationItem) -> String {
    item.subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SUBJECT)
        .to_string()
}

fn into_groups(groups: BTreeMap<String, Tally>) -> Vec<GroupSummary> {
    groups
        .into_iter()
        .map(|(key, tally)| GroupSummary {
            key,
            tally: tally.finish(),
        })
        .collect()
}

/// Reduces evaluated items to overall, per-subject and per-type summaries.
pub fn aggregate(items: &[EvaluationItem]) -> ScoreSummary {
    let mut totals = Tally::default();
    let mut by_subject: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_type: BTreeMap<String, Tally> = BTreeMap::new();

    for item in items {
        totals.record(item);
        by_subject.entry(subject_key(item)).or_default().record(item);
        by_type
            .entry(item.question_type.as_str().to_string())
            .or_default()
            .record(item);
    }

    let totals = totals.finish();

    // BTreeMap iteration already yields names ascending; the stable sort keeps
    // that order among equal net scores.
    let mut by_subject = into_groups(by_subject);
    by_subject.sort_by_key(|g| std::cmp::Reverse(g.tally.net_cents()));
    let by_type = into_groups(by_type);

    ScoreSummary {
        score: totals.net_score,
        accuracy: totals.accuracy,
        max_score: totals.max_score,
        breakdown: Breakdown {
            totals,
            by_subject,
            by_type,
        },
    }
}
