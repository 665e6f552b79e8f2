// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// The three answer semantics supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    /// Exactly one correct label (MCQ).
    #[serde(alias = "MCQ", alias = "single")]
    SingleChoice,
    /// Exact set of correct labels, no partial credit (MSQ).
    #[serde(alias = "MSQ", alias = "multiple")]
    MultiChoice,
    /// Numeric answer checked by tolerance, range or set membership (NAT).
    #[serde(alias = "NAT")]
    Numeric,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::MultiChoice => "MULTI_CHOICE",
            QuestionType::Numeric => "NUMERIC",
        }
    }

    /// Parses the stored column value, accepting the short exam labels too.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SINGLE_CHOICE" | "MCQ" | "SINGLE" => Some(QuestionType::SingleChoice),
            "MULTI_CHOICE" | "MSQ" | "MULTIPLE" => Some(QuestionType::MultiChoice),
            "NUMERIC" | "NAT" => Some(QuestionType::Numeric),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub subject: String,

    pub topic: Option<String>,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,

    pub content: String,

    /// Option labels shown to the learner. Empty for NUMERIC questions.
    pub options: Json<Vec<String>>,

    /// Authoritative answer key; its JSON shape depends on `question_type`.
    pub answer_key: Json<Value>,

    pub marks: f64,

    pub negative_marks: f64,

    pub section: Option<String>,

    pub difficulty: Option<String>,

    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// Projects the row into the shape the scoring engine consumes.
    pub fn to_scoring(&self) -> ScoringQuestion {
        let question_type = QuestionType::parse(&self.question_type).unwrap_or_else(|| {
            tracing::warn!(
                "Question {} has unknown type '{}', scoring as single choice",
                self.id,
                self.question_type
            );
            QuestionType::SingleChoice
        });

        ScoringQuestion {
            id: Some(self.id.to_string()),
            subject: Some(self.subject.clone()),
            topic: self.topic.clone(),
            question_type,
            marks: self.marks,
            negative_marks: self.negative_marks,
            answer_key: self.answer_key.0.clone(),
        }
    }
}

/// The fields of a question the evaluator and aggregator need.
///
/// Accepted as-is by the stateless evaluation endpoint, so ids may arrive as
/// strings, numbers or not at all (answers are then addressed by position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringQuestion {
    #[serde(default, deserialize_with = "deserialize_loose_id")]
    pub id: Option<String>,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[serde(default = "default_marks")]
    pub marks: f64,

    /// Deduction magnitude for a wrong SINGLE_CHOICE attempt.
    #[serde(default, alias = "negativeMarks")]
    pub negative_marks: f64,

    #[serde(default, alias = "answerKey", alias = "answer")]
    pub answer_key: Value,
}

fn default_marks() -> f64 {
    1.0
}

fn deserialize_loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// DTO for sending a question to the learner (excludes the answer key and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub subject: String,
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub question_type: String,
    pub content: String,
    pub options: Json<Vec<String>>,
    pub marks: f64,
    pub negative_marks: f64,
    pub section: Option<String>,
    pub difficulty: Option<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            subject: q.subject,
            topic: q.topic,
            question_type: q.question_type,
            content: q.content,
            options: q.options,
            marks: q.marks,
            negative_marks: q.negative_marks,
            section: q.section,
            difficulty: q.difficulty,
        }
    }
}

/// DTO for adding a question to the bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(max = 200))]
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(custom(function = validate_answer_key))]
    pub answer_key: Value,
    #[validate(range(min = 0.0, max = 100.0))]
    pub marks: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub negative_marks: f64,
    #[validate(length(max = 50))]
    pub section: Option<String>,
    #[validate(length(max = 20))]
    pub difficulty: Option<String>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 10 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.len() > 1000 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_answer_key(key: &Value) -> Result<(), validator::ValidationError> {
    if key.is_null() {
        return Err(validator::ValidationError::new("answer_key_required"));
    }
    if key.to_string().len() > 2000 {
        return Err(validator::ValidationError::new("answer_key_too_large"));
    }
    Ok(())
}
