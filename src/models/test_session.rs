// src/models/test_session.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{
    models::answer::{AnswerPayload, AnswerSheet},
    scoring::Tolerance,
};

/// Represents the 'test_sessions' table in the database.
/// One row per timed attempt; mutated only inside the session lock.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestSession {
    pub id: i64,
    pub user_id: i64,

    /// Free-form label chosen by the client (e.g. 'full', 'subject', 'practice').
    pub mode: String,
    pub subject: Option<String>,

    /// Question order is fixed at creation; positional answers refer to it.
    pub question_ids: Json<Vec<i64>>,
    /// Keyed by question id; positional payloads are re-keyed on write.
    pub answers: Json<AnswerSheet>,

    /// Seconds left on the learner's clock as of the last autosave.
    pub remaining_time: i32,
    pub total_questions: i32,

    pub is_submitted: bool,
    pub score: Option<f64>,
    pub accuracy: Option<f64>,
    pub max_score: Option<f64>,

    /// Numeric tolerances the score was computed with, set on submit.
    pub abs_tolerance: Option<f64>,
    pub rel_tolerance: Option<f64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Submitted,
}

impl TestSession {
    pub fn status(&self) -> SessionStatus {
        if self.is_submitted {
            SessionStatus::Submitted
        } else {
            SessionStatus::Active
        }
    }

    pub fn scored_tolerance(&self) -> Option<Tolerance> {
        Some(Tolerance {
            abs_tol: self.abs_tolerance?,
            rel_tol: self.rel_tolerance?,
        })
    }
}

/// Row shape for the history listing.
#[derive(Debug, Serialize, FromRow)]
pub struct SessionSummaryRow {
    pub id: i64,
    pub mode: String,
    pub subject: Option<String>,
    pub total_questions: i32,
    pub is_submitted: bool,
    pub score: Option<f64>,
    pub accuracy: Option<f64>,
    pub max_score: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for starting a timed test.
#[derive(Debug, Deserialize, Validate)]
pub struct StartTestRequest {
    #[validate(length(min = 1, max = 20))]
    pub mode: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(range(min = 1, max = 200))]
    pub count: Option<i64>,
    /// Seconds on the clock; the configured default applies when absent.
    #[validate(range(min = 60, max = 36000))]
    pub duration: Option<i32>,
}

/// DTO for the periodic autosave.
#[derive(Debug, Deserialize)]
pub struct AutosaveRequest {
    #[serde(default)]
    pub answers: AnswerPayload,
    #[serde(alias = "remainingTime")]
    pub remaining_time: i32,
}

/// DTO for the final submission. Falls back to the autosaved answers when
/// `answers` is omitted or null.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitTestRequest {
    #[serde(default)]
    pub answers: Option<AnswerPayload>,
}
