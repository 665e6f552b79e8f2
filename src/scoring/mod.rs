// src/scoring/mod.rs

//! Answer evaluation and scoring.
//!
//! Pipeline: [`normalize`] raw values, judge each question in [`evaluator`],
//! then reduce the verdicts in [`aggregator`]. Nothing here touches storage.

pub mod aggregator;
pub mod evaluator;
pub mod normalize;

pub use aggregator::{ScoreSummary, aggregate};
pub use evaluator::{Addressing, Evaluation, EvaluationItem, Tolerance, evaluate, evaluate_placed};

use crate::models::{answer::AnswerSheet, question::ScoringQuestion};

/// Evaluates and aggregates in one call.
pub fn score_answers(
    questions: &[ScoringQuestion],
    answers: &AnswerSheet,
    tolerance: &Tolerance,
) -> (Evaluation, ScoreSummary) {
    let evaluation = evaluate(questions, answers, tolerance);
    let summary = aggregate(&evaluation.items);
    (evaluation, summary)
}

/// [`score_answers`] for questions at explicit positions with a known addressing mode.
pub fn score_placed<'q, I>(
    questions: I,
    answers: &AnswerSheet,
    tolerance: &Tolerance,
    addressing: Addressing,
) -> (Evaluation, ScoreSummary)
where
    I: IntoIterator<Item = (usize, &'q ScoringQuestion)>,
{
    let evaluation = evaluate_placed(questions, answers, tolerance, addressing);
    let summary = aggregate(&evaluation.items);
    (evaluation, summary)
}
