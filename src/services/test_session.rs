// src/services/test_session.rs

//! Autosave and submit, each executed inside the session lock.

use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerPayload, AnswerSheet},
        question::ScoringQuestion,
        test_session::{SessionStatus, TestSession},
    },
    scoring::{self, Addressing, Evaluation, ScoreSummary, Tolerance},
    services::session_lock::SessionStore,
};

#[derive(Debug, Clone, Serialize)]
pub struct AutosaveOutcome {
    pub session_id: i64,
    pub remaining_time: i32,
    pub answered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub session_id: i64,
    /// Questions of the paper no longer in the bank; they are not scored.
    pub missing_questions: usize,
    #[serde(flatten)]
    pub summary: ScoreSummary,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Sessions belonging to someone else are reported as missing.
fn ensure_active(session: &TestSession, user_id: i64) -> Result<(), AppError> {
    if session.user_id != user_id {
        return Err(AppError::NotFound(format!(
            "Test session {} not found",
            session.id
        )));
    }
    if session.status() == SessionStatus::Submitted {
        return Err(AppError::Conflict(format!(
            "Test session {} has already been submitted",
            session.id
        )));
    }
    Ok(())
}

fn answered_count(answers: &AnswerSheet) -> usize {
    answers
        .values()
        .filter(|v| match v {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            _ => true,
        })
        .count()
}

fn placed(questions: &[(usize, ScoringQuestion)]) -> impl Iterator<Item = (usize, &ScoringQuestion)> {
    questions.iter().map(|(index, question)| (*index, question))
}

/// Replaces the in-progress answers and clock of an active session.
/// Positional answers are stored keyed by the session's question ids.
/// Repeating the same autosave leaves the row unchanged.
pub async fn autosave<S: SessionStore>(
    store: &S,
    session_id: i64,
    user_id: i64,
    answers: AnswerPayload,
    remaining_time: i32,
) -> Result<AutosaveOutcome, AppError> {
    let outcome = store
        .with_lock(session_id, move |session| {
            ensure_active(session, user_id)?;

            let answers = answers.keyed_by(&session.question_ids.0);
            let answered = answered_count(&answers);
            session.answers.0 = answers;
            session.remaining_time = remaining_time.max(0);

            Ok(AutosaveOutcome {
                session_id: session.id,
                remaining_time: session.remaining_time,
                answered,
            })
        })
        .await?;

    tracing::debug!(
        "Autosaved session {} ({} answered, {}s left)",
        outcome.session_id,
        outcome.answered,
        outcome.remaining_time
    );

    Ok(outcome)
}

/// Scores an active session and moves it to the terminal submitted state.
///
/// `questions` pairs each question with its position in the session paper;
/// questions deleted from the bank are simply absent. They are loaded outside
/// the lock because questions never change once a session exists. When
/// `final_answers` is `None` the autosaved answers are scored.
pub async fn submit<S: SessionStore>(
    store: &S,
    session_id: i64,
    user_id: i64,
    questions: &[(usize, ScoringQuestion)],
    final_answers: Option<AnswerPayload>,
    tolerance: Tolerance,
) -> Result<SubmitOutcome, AppError> {
    let outcome = store
        .with_lock(session_id, move |session| {
            ensure_active(session, user_id)?;

            if let Some(answers) = final_answers {
                session.answers.0 = answers.keyed_by(&session.question_ids.0);
            }

            let (evaluation, summary) =
                scoring::score_placed(placed(questions), &session.answers.0, &tolerance, Addressing::Id);

            session.is_submitted = true;
            session.score = Some(summary.score);
            session.accuracy = Some(summary.accuracy);
            session.max_score = Some(summary.max_score);
            session.abs_tolerance = Some(tolerance.abs_tol);
            session.rel_tolerance = Some(tolerance.rel_tol);
            session.submitted_at = Some(chrono::Utc::now());

            Ok(SubmitOutcome {
                session_id: session.id,
                missing_questions: session.question_ids.0.len().saturating_sub(questions.len()),
                summary,
                evaluation,
            })
        })
        .await?;

    if outcome.missing_questions > 0 {
        tracing::warn!(
            "Session {} scored without {} deleted question(s)",
            outcome.session_id,
            outcome.missing_questions
        );
    }

    tracing::info!(
        "Session {} submitted: score {}/{} accuracy {}%",
        outcome.session_id,
        outcome.summary.score,
        outcome.summary.max_score,
        outcome.summary.accuracy
    );

    Ok(outcome)
}

/// Re-scores a submitted session for review, with the tolerances it was
/// scored with. `fallback` applies only to rows that predate stored tolerances.
pub fn review(
    session: &TestSession,
    questions: &[(usize, ScoringQuestion)],
    fallback: Tolerance,
) -> (Evaluation, ScoreSummary) {
    let tolerance = session.scored_tolerance().unwrap_or(fallback);
    scoring::score_placed(placed(questions), &session.answers.0, &tolerance, Addressing::Id)
}
