// src/handlers/test_session.rs

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        answer::AnswerSheet,
        question::{PublicQuestion, Question, ScoringQuestion},
        test_session::{
            AutosaveRequest, SessionStatus, SessionSummaryRow, StartTestRequest, SubmitTestRequest,
            TestSession,
        },
    },
    scoring::{EvaluationItem, ScoreSummary},
    services::{
        session_lock::{PgSessionStore, SESSION_COLUMNS},
        test_session,
    },
    utils::jwt::AuthUser,
};

const QUESTION_COLUMNS: &str = "id, subject, topic, type, content, options, answer_key, marks, \
     negative_marks, section, difficulty, explanation, created_at";

/// Response for a started or resumed test. Never carries answer keys.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: i64,
    pub mode: String,
    pub subject: Option<String>,
    pub status: SessionStatus,
    pub remaining_time: i32,
    pub total_questions: i32,
    pub answers: AnswerSheet,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Serialize)]
pub struct ReviewEntry {
    pub question: PublicQuestion,
    pub explanation: Option<String>,
    pub result: EvaluationItem,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub session_id: i64,
    #[serde(flatten)]
    pub summary: ScoreSummary,
    pub entries: Vec<ReviewEntry>,
}

/// Fetches a session owned by `user_id` without locking it.
async fn fetch_session(pool: &PgPool, session_id: i64, user_id: i64) -> Result<TestSession, AppError> {
    let query = format!(
        "SELECT {} FROM test_sessions WHERE id = $1 AND user_id = $2",
        SESSION_COLUMNS
    );
    sqlx::query_as::<_, TestSession>(&query)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch test session {}: {:?}", session_id, e);
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::NotFound(format!("Test session {} not found", session_id)))
}

/// Loads questions by id, each paired with its position in `ids`.
/// Questions deleted from the bank since the session started are dropped;
/// the remaining ones keep their original positions.
async fn load_questions(pool: &PgPool, ids: &[i64]) -> Result<Vec<(usize, Question)>, AppError> {
    let query = format!("SELECT {} FROM questions WHERE id = ANY($1)", QUESTION_COLUMNS);
    let rows = sqlx::query_as::<_, Question>(&query)
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load session questions: {:?}", e);
            AppError::from(e)
        })?;

    let mut by_id: HashMap<i64, Question> = rows.into_iter().map(|q| (q.id, q)).collect();
    let ordered: Vec<(usize, Question)> = ids
        .iter()
        .enumerate()
        .filter_map(|(position, id)| by_id.remove(id).map(|q| (position, q)))
        .collect();

    if ordered.len() != ids.len() {
        tracing::warn!(
            "{} of {} session questions are missing from the bank",
            ids.len() - ordered.len(),
            ids.len()
        );
    }

    Ok(ordered)
}

fn session_view(session: TestSession, questions: impl IntoIterator<Item = Question>) -> SessionView {
    SessionView {
        session_id: session.id,
        status: session.status(),
        mode: session.mode,
        subject: session.subject,
        remaining_time: session.remaining_time,
        total_questions: session.total_questions,
        answers: session.answers.0,
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }
}

/// Starts a timed test with random questions from the bank.
///
/// * Optional `subject` restricts the draw to one subject.
/// * `count` and `duration` fall back to the configured defaults.
pub async fn start_test(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    user: AuthUser,
    Json(req): Json<StartTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let count = req.count.unwrap_or(config.default_question_count);
    let duration = req.duration.unwrap_or(config.default_test_duration);

    let query = format!(
        "SELECT {} FROM questions WHERE ($1::TEXT IS NULL OR subject = $1) ORDER BY RANDOM() LIMIT $2",
        QUESTION_COLUMNS
    );
    let questions = sqlx::query_as::<_, Question>(&query)
        .bind(req.subject.as_deref())
        .bind(count)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to draw questions: {:?}", e);
            AppError::from(e)
        })?;

    if questions.is_empty() {
        return Err(AppError::NotFound(
            "No questions available for this selection".to_string(),
        ));
    }

    let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();

    let query = format!(
        r#"
        INSERT INTO test_sessions (user_id, mode, subject, question_ids, answers, remaining_time, total_questions)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        SESSION_COLUMNS
    );
    let session = sqlx::query_as::<_, TestSession>(&query)
        .bind(user.id)
        .bind(&req.mode)
        .bind(req.subject.as_deref())
        .bind(SqlJson(question_ids.clone()))
        .bind(SqlJson(AnswerSheet::new()))
        .bind(duration)
        .bind(question_ids.len() as i32)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test session: {:?}", e);
            AppError::from(e)
        })?;

    tracing::info!(
        "User {} started session {} ({} questions, {}s)",
        user.id,
        session.id,
        session.total_questions,
        session.remaining_time
    );

    Ok((StatusCode::CREATED, Json(session_view(session, questions))))
}

/// Resumes a test: current answers, clock and the questions (without keys).
pub async fn get_test(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = fetch_session(&pool, session_id, user.id).await?;
    let questions = load_questions(&pool, &session.question_ids.0).await?;

    Ok(Json(session_view(session, questions.into_iter().map(|(_, q)| q))))
}

/// Lists the caller's sessions, newest first.
pub async fn list_tests(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, SessionSummaryRow>(
        r#"
        SELECT id, mode, subject, total_questions, is_submitted, score, accuracy,
               max_score, created_at, submitted_at
        FROM test_sessions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 50
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list test sessions: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(rows))
}

/// Stores in-progress answers and the remaining time.
pub async fn autosave_test(
    State(store): State<PgSessionStore>,
    user: AuthUser,
    Path(session_id): Path<i64>,
    Json(req): Json<AutosaveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome =
        test_session::autosave(&store, session_id, user.id, req.answers, req.remaining_time).await?;

    Ok(Json(outcome))
}

/// Final submission: evaluates and locks in the score.
/// A second submission of the same session is rejected with 409.
pub async fn submit_test(
    State(pool): State<PgPool>,
    State(store): State<PgSessionStore>,
    State(config): State<Config>,
    user: AuthUser,
    Path(session_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // An empty body submits the autosaved answers.
    let req: SubmitTestRequest = if body.is_empty() {
        SubmitTestRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let session = fetch_session(&pool, session_id, user.id).await?;
    if session.is_submitted {
        return Err(AppError::Conflict(format!(
            "Test session {} has already been submitted",
            session_id
        )));
    }

    let questions: Vec<(usize, ScoringQuestion)> = load_questions(&pool, &session.question_ids.0)
        .await?
        .iter()
        .map(|(position, q)| (*position, q.to_scoring()))
        .collect();

    let outcome = test_session::submit(
        &store,
        session_id,
        user.id,
        &questions,
        req.answers,
        config.tolerance(),
    )
    .await?;

    Ok(Json(outcome))
}

/// Server-side verdicts for a submitted session, with explanations.
/// Scored with the tolerances stored at submit time.
pub async fn review_test(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    user: AuthUser,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = fetch_session(&pool, session_id, user.id).await?;
    if !session.is_submitted {
        return Err(AppError::Conflict(
            "Review is available after submission".to_string(),
        ));
    }

    let questions = load_questions(&pool, &session.question_ids.0).await?;
    let scoring_questions: Vec<(usize, ScoringQuestion)> = questions
        .iter()
        .map(|(position, q)| (*position, q.to_scoring()))
        .collect();
    let (evaluation, summary) = test_session::review(&session, &scoring_questions, config.tolerance());

    let entries = questions
        .into_iter()
        .zip(evaluation.items)
        .map(|((_, question), result)| ReviewEntry {
            explanation: question.explanation.clone(),
            question: PublicQuestion::from(question),
            result,
        })
        .collect();

    Ok(Json(ReviewResponse {
        session_id,
        summary,
        entries,
    }))
}
