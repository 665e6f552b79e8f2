// src/scoring/evaluator.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    models::{
        answer::AnswerSheet,
        question::{QuestionType, ScoringQuestion},
    },
    scoring::normalize::{CanonicalAnswer, NumericToken, normalize_reference, normalize_submitted},
};

/// Floor for the magnitude used by the relative tolerance, so a zero
/// reference does not collapse the band to nothing.
const MIN_MAGNITUDE: f64 = 1e-9;

/// Numeric-answer tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    #[serde(alias = "absTol")]
    pub abs_tol: f64,
    #[serde(alias = "relTol")]
    pub rel_tol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            abs_tol: 0.01,
            rel_tol: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
    Skipped,
}

/// Outcome for one question. Built only by [`evaluate_item`], which keeps
/// exactly one of the three flags set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationItem {
    pub question_id: Option<String>,
    /// Position of the question in its paper.
    pub index: usize,
    pub subject: Option<String>,
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub marks: f64,
    pub negative_marks: f64,
    pub submitted: CanonicalAnswer,
    pub reference: CanonicalAnswer,
    pub verdict: Verdict,
    pub is_correct: bool,
    pub is_wrong: bool,
    pub is_skipped: bool,
    pub marks_awarded: f64,
    pub negative_awarded: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationTotals {
    pub correct: usize,
    pub wrong: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub items: Vec<EvaluationItem>,
    pub totals: EvaluationTotals,
}

/// How the keys of an answer sheet address questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Keys are question ids.
    Id,
    /// Keys are 0-based positions written as strings.
    Position,
}

impl Addressing {
    /// Id keys when any question's id appears in the sheet, positions otherwise.
    /// Decided once per sheet so numeric ids never collide with positions.
    pub fn detect(questions: &[ScoringQuestion], answers: &AnswerSheet) -> Self {
        let keyed_by_id = questions
            .iter()
            .filter_map(|q| q.id.as_ref())
            .any(|id| answers.contains_key(id));

        if keyed_by_id {
            Addressing::Id
        } else {
            Addressing::Position
        }
    }
}

/// Finds the raw answer for the question at `index`.
pub fn lookup_answer<'a>(
    answers: &'a AnswerSheet,
    question: &ScoringQuestion,
    index: usize,
    addressing: Addressing,
) -> Option<&'a Value> {
    match addressing {
        Addressing::Id => question.id.as_ref().and_then(|id| answers.get(id)),
        Addressing::Position => answers.get(&index.to_string()),
    }
}

fn numbers_match(submitted: f64, reference: f64, tolerance: &Tolerance) -> bool {
    let relative = tolerance.rel_tol * reference.abs().max(MIN_MAGNITUDE);
    (submitted - reference).abs() <= tolerance.abs_tol.max(relative)
}

fn token_matches(submitted: &NumericToken, member: &NumericToken, tolerance: &Tolerance) -> bool {
    match (submitted, member) {
        (NumericToken::Number(s), NumericToken::Number(m)) => numbers_match(*s, *m, tolerance),
        (NumericToken::Text(s), NumericToken::Text(m)) => s.trim().eq_ignore_ascii_case(m.trim()),
        _ => false,
    }
}

/// Type-specific equality between a normalized submission and a normalized key.
pub fn answers_match(
    submitted: &CanonicalAnswer,
    reference: &CanonicalAnswer,
    tolerance: &Tolerance,
) -> bool {
    use CanonicalAnswer::*;

    match (submitted, reference) {
        (Single(s), Single(r)) => s == r,
        (MultiSet(s), MultiSet(r)) => s == r,
        (Numeric(NumericToken::Number(x)), NumericRange { min, max }) => {
            *x >= min - tolerance.abs_tol && *x <= max + tolerance.abs_tol
        }
        (Numeric(s), Numeric(r)) => token_matches(s, r, tolerance),
        (Numeric(s), NumericSet(members)) => members.iter().any(|m| token_matches(s, m, tolerance)),
        _ => false,
    }
}

/// Scores one question against one raw submission.
pub fn evaluate_item(
    question: &ScoringQuestion,
    index: usize,
    submitted: Option<&Value>,
    tolerance: &Tolerance,
) -> EvaluationItem {
    let submitted = normalize_submitted(question.question_type, submitted);
    let reference = normalize_reference(question.question_type, &question.answer_key);

    let verdict = if submitted.is_empty() {
        Verdict::Skipped
    } else if answers_match(&submitted, &reference, tolerance) {
        Verdict::Correct
    } else {
        Verdict::Wrong
    };

    let negative_marks = question.negative_marks.abs();
    let marks_awarded = if verdict == Verdict::Correct {
        question.marks
    } else {
        0.0
    };
    // Only single-best-choice questions are penalized.
    let negative_awarded =
        if verdict == Verdict::Wrong && question.question_type == QuestionType::SingleChoice {
            negative_marks
        } else {
            0.0
        };

    EvaluationItem {
        question_id: question.id.clone(),
        index,
        subject: question.subject.clone(),
        topic: question.topic.clone(),
        question_type: question.question_type,
        marks: question.marks,
        negative_marks,
        submitted,
        reference,
        verdict,
        is_correct: verdict == Verdict::Correct,
        is_wrong: verdict == Verdict::Wrong,
        is_skipped: verdict == Verdict::Skipped,
        marks_awarded,
        negative_awarded,
    }
}

/// Scores every question in order against the answer sheet, detecting how
/// the sheet is keyed.
pub fn evaluate(
    questions: &[ScoringQuestion],
    answers: &AnswerSheet,
    tolerance: &Tolerance,
) -> Evaluation {
    let addressing = Addressing::detect(questions, answers);
    evaluate_placed(questions.iter().enumerate(), answers, tolerance, addressing)
}

/// Scores questions at explicit positions.
///
/// Positions are reported on each item and used for [`Addressing::Position`]
/// lookups, so a gap in the list does not shift later answers.
pub fn evaluate_placed<'q, I>(
    questions: I,
    answers: &AnswerSheet,
    tolerance: &Tolerance,
    addressing: Addressing,
) -> Evaluation
where
    I: IntoIterator<Item = (usize, &'q ScoringQuestion)>,
{
    let mut totals = EvaluationTotals::default();

    let items: Vec<EvaluationItem> = questions
        .into_iter()
        .map(|(index, question)| {
            let raw = lookup_answer(answers, question, index, addressing);
            let item = evaluate_item(question, index, raw, tolerance);
            match item.verdict {
                Verdict::Correct => totals.correct += 1,
                Verdict::Wrong => totals.wrong += 1,
                Verdict::Skipped => totals.skipped += 1,
            }
            item
        })
        .collect();

    totals.total = items.len();
    totals.attempted = totals.total - totals.skipped;

    tracing::debug!(
        total = totals.total,
        correct = totals.correct,
        wrong = totals.wrong,
        skipped = totals.skipped,
        ?addressing,
        "Evaluated answer sheet"
    );

    Evaluation { items, totals }
}
