// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, QuestionType},
    scoring::normalize::normalize_reference,
    utils::jwt::AdminUser,
};

/// Adds a question to the bank.
/// Admin only. Keys that normalize to nothing are rejected up front, since
/// they could never be answered correctly.
pub async fn create_question(
    State(pool): State<PgPool>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if normalize_reference(payload.question_type, &payload.answer_key).is_empty() {
        return Err(AppError::BadRequest(format!(
            "answer_key is not a valid {} key",
            payload.question_type
        )));
    }
    if payload.question_type != QuestionType::Numeric && payload.options.is_empty() {
        return Err(AppError::BadRequest(
            "Choice questions need at least one option".to_string(),
        ));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions
        (subject, topic, type, content, options, answer_key, marks, negative_marks, section, difficulty, explanation)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(&payload.subject)
    .bind(payload.topic.as_deref())
    .bind(payload.question_type.as_str())
    .bind(&payload.content)
    .bind(SqlJson(payload.options.clone()))
    .bind(SqlJson(payload.answer_key.clone()))
    .bind(payload.marks)
    .bind(payload.negative_marks)
    .bind(payload.section.as_deref())
    .bind(payload.difficulty.as_deref())
    .bind(payload.explanation.as_deref())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!("Admin {} added question {} ({})", admin.id, id, payload.question_type);

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Removes a question from the bank.
/// Admin only. Sessions that already drew it simply score without it.
pub async fn delete_question(
    State(pool): State<PgPool>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tracing::info!("Admin {} deleted question {}", admin.id, id);

    Ok(StatusCode::NO_CONTENT)
}
