use std::collections::HashMap;

use serde::Serialize;

use crate::model::ids::QuestionUid;
use crate::model::question::Question;

/// Canonical form used on both sides of answer matching: trimmed, uppercase.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Returns true when `answer` matches any of the question's correct answers.
///
/// Blank answers never match. Any single match is full credit.
#[must_use]
pub fn is_correct(question: &Question, answer: &str) -> bool {
    let answer = normalize_answer(answer);
    if answer.is_empty() {
        return false;
    }
    question
        .correct_answers
        .iter()
        .any(|key| normalize_answer(key) == answer)
}

/// Score summary for a run, derived from items and recorded answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub percentage: u32,
}

impl Score {
    /// Computes the score of `items` against `answers`.
    ///
    /// `total` is floored at 1 so an empty run scores `0/1`, `0%`.
    #[must_use]
    pub fn compute(items: &[Question], answers: &HashMap<QuestionUid, String>) -> Self {
        let correct = items
            .iter()
            .filter(|item| {
                answers
                    .get(&item.uid)
                    .is_some_and(|answer| is_correct(item, answer))
            })
            .count();

        let total = items.len().max(1);
        let correct = u32::try_from(correct).unwrap_or(u32::MAX);
        let total = u32::try_from(total).unwrap_or(u32::MAX);

        Self {
            correct,
            total,
            percentage: rounded_percentage(correct, total),
        }
    }
}

// Half rounds up, matching how the score has always been displayed.
fn rounded_percentage(correct: u32, total: u32) -> u32 {
    let correct = u64::from(correct.min(total));
    let total = u64::from(total.max(1));
    let pct = (correct * 200 + total) / (total * 2);
    u32::try_from(pct).unwrap_or(100)
}
