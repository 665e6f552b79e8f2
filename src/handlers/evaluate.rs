// src/handlers/evaluate.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{answer::AnswerPayload, question::ScoringQuestion},
    scoring::{self, Addressing, Evaluation, ScoreSummary, Tolerance},
};

/// DTO for stateless evaluation: questions with keys plus raw answers.
#[derive(Debug, Deserialize, Validate)]
pub struct EvaluateRequest {
    #[validate(length(min = 1, max = 500))]
    pub questions: Vec<ScoringQuestion>,
    /// Object keyed by question id or position, or a positional array.
    #[serde(default)]
    pub answers: AnswerPayload,
    /// Overrides the deployment's numeric tolerances.
    pub tolerance: Option<Tolerance>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    #[serde(flatten)]
    pub summary: ScoreSummary,
}

/// Scores an answer sheet without touching any session.
///
/// This is the same evaluator the submit flow uses, exposed so clients can
/// show verdicts without re-implementing the comparison rules.
pub async fn evaluate_answers(
    State(config): State<Config>,
    Json(req): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let tolerance = req.tolerance.unwrap_or_else(|| config.tolerance());
    if !(tolerance.abs_tol >= 0.0 && tolerance.rel_tol >= 0.0) {
        return Err(AppError::BadRequest(
            "Tolerances must be non-negative numbers".to_string(),
        ));
    }

    // Arrays are positional by construction; objects are keyed by ids when
    // any id matches, by positions otherwise.
    let positional = req.answers.is_positional();
    let answers = req.answers.into_sheet();
    let addressing = if positional {
        Addressing::Position
    } else {
        Addressing::detect(&req.questions, &answers)
    };

    let (evaluation, summary) = scoring::score_placed(
        req.questions.iter().enumerate(),
        &answers,
        &tolerance,
        addressing,
    );

    Ok(Json(EvaluateResponse {
        evaluation,
        summary,
    }))
}
