//! Scoring and review.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flowpath::AssessmentItem;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Per-item outcome within a scored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub index: usize,
    pub selected: Option<usize>,
    pub correct: bool,
}

/// Final result of an assessment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total_items: usize,
    pub correct_count: usize,
    /// Wrong answers plus unanswered items
    pub incorrect_count: usize,
    pub unanswered_count: usize,
    /// `round(100 * correct / total)`, 0 for an empty session
    pub score_percent: u8,
    /// Seconds since session start, capped at the time limit
    pub time_taken_seconds: u64,
    /// Finished by the countdown rather than the learner
    pub timed_out: bool,
    pub items: Vec<ItemOutcome>,
}

impl ScoreResult {
    pub fn passed(&self, threshold_percent: u8) -> bool {
        self.score_percent >= threshold_percent
    }
}

/// An item re-displayed after finishing. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub index: usize,
    pub question: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub correct_answer_index: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Score `answers` (item index -> option index) against `items`.
///
/// Unanswered items count as incorrect.
pub fn grade(
    items: &[AssessmentItem],
    answers: &BTreeMap<usize, usize>,
    time_taken_seconds: u64,
    timed_out: bool,
) -> ScoreResult {
    let outcomes: Vec<ItemOutcome> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let selected = answers.get(&index).copied();
            ItemOutcome {
                index,
                selected,
                correct: selected.is_some_and(|s| item.is_correct(s)),
            }
        })
        .collect();

    let total_items = items.len();
    let correct_count = outcomes.iter().filter(|o| o.correct).count();
    let unanswered_count = outcomes.iter().filter(|o| o.selected.is_none()).count();

    ScoreResult {
        total_items,
        correct_count,
        incorrect_count: total_items - correct_count,
        unanswered_count,
        score_percent: percent(correct_count, total_items),
        time_taken_seconds,
        timed_out,
        items: outcomes,
    }
}

/// Build the review list for a graded session.
pub fn review_items(items: &[AssessmentItem], answers: &BTreeMap<usize, usize>) -> Vec<ReviewItem> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let selected = answers.get(&index).copied();
            ReviewItem {
                index,
                question: item.question.clone(),
                options: item.options.clone(),
                selected,
                correct_answer_index: item.correct_answer_index,
                is_correct: selected.is_some_and(|s| item.is_correct(s)),
                explanation: item.explanation.clone(),
            }
        })
        .collect()
}

fn percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 * 100.0) / total as f64).round() as u8
}
