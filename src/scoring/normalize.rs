// src/scoring/normalize.rs

//! Canonical forms for submitted and reference answers.
//!
//! Every function here is total: malformed input degrades to
//! [`CanonicalAnswer::Empty`] or to a text token, never to an error.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::models::question::QuestionType;

/// A single numeric-answer token: a finite number, or text kept verbatim
/// (trimmed) for answers such as "infinity".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumericToken {
    Number(f64),
    Text(String),
}

/// Comparable answer value. Reference keys and submissions share this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CanonicalAnswer {
    /// Nothing usable was supplied.
    Empty,
    Single(String),
    MultiSet(BTreeSet<String>),
    Numeric(NumericToken),
    /// Closed interval, `min <= max` guaranteed.
    NumericRange { min: f64, max: f64 },
    NumericSet(Vec<NumericToken>),
}

impl CanonicalAnswer {
    pub fn is_empty(&self) -> bool {
        matches!(self, CanonicalAnswer::Empty)
    }
}

/// Normalizes a learner's raw answer for the given question type.
pub fn normalize_submitted(question_type: QuestionType, raw: Option<&Value>) -> CanonicalAnswer {
    match question_type {
        QuestionType::SingleChoice => normalize_single(raw),
        QuestionType::MultiChoice => normalize_multi(raw),
        QuestionType::Numeric => normalize_numeric(raw),
    }
}

/// Normalizes an answer key. NUMERIC keys may also be ranges or sets.
pub fn normalize_reference(question_type: QuestionType, raw: &Value) -> CanonicalAnswer {
    match question_type {
        QuestionType::SingleChoice => normalize_single(Some(raw)),
        QuestionType::MultiChoice => normalize_multi(Some(raw)),
        QuestionType::Numeric => normalize_numeric_reference(raw),
    }
}

/// Parses a finite number out of trimmed text.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Trimmed text form of a JSON scalar. Arrays and objects have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn label(text: &str) -> String {
    text.trim().to_uppercase()
}

fn normalize_single(raw: Option<&Value>) -> CanonicalAnswer {
    let text = match raw {
        None | Some(Value::Null) => return CanonicalAnswer::Empty,
        Some(Value::Array(items)) => match items.as_slice() {
            [] => return CanonicalAnswer::Empty,
            [only] => return normalize_single(Some(only)),
            many => many
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        },
        Some(obj @ Value::Object(_)) => obj.to_string(),
        Some(other) => scalar_text(other).unwrap_or_default(),
    };

    let text = label(&text);
    if text.is_empty() {
        CanonicalAnswer::Empty
    } else {
        CanonicalAnswer::Single(text)
    }
}

fn normalize_multi(raw: Option<&Value>) -> CanonicalAnswer {
    let labels: BTreeSet<String> = match raw {
        None | Some(Value::Null) | Some(Value::Object(_)) => BTreeSet::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .map(|t| label(&t))
            .filter(|t| !t.is_empty())
            .collect(),
        Some(other) => scalar_text(other)
            .unwrap_or_default()
            .split(',')
            .map(label)
            .filter(|t| !t.is_empty())
            .collect(),
    };

    if labels.is_empty() {
        CanonicalAnswer::Empty
    } else {
        CanonicalAnswer::MultiSet(labels)
    }
}

fn numeric_token(value: &Value) -> Option<NumericToken> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(NumericToken::Number),
        Value::Array(_) | Value::Object(_) => Some(NumericToken::Text(value.to_string())),
        other => {
            let text = scalar_text(other)?;
            if text.is_empty() {
                None
            } else if let Some(n) = parse_number(&text) {
                Some(NumericToken::Number(n))
            } else {
                Some(NumericToken::Text(text))
            }
        }
    }
}

fn normalize_numeric(raw: Option<&Value>) -> CanonicalAnswer {
    match raw {
        None | Some(Value::Null) => CanonicalAnswer::Empty,
        Some(Value::Array(items)) if items.is_empty() => CanonicalAnswer::Empty,
        Some(Value::Array(items)) if items.len() == 1 => normalize_numeric(items.first()),
        Some(value) => numeric_token(value)
            .map(CanonicalAnswer::Numeric)
            .unwrap_or(CanonicalAnswer::Empty),
    }
}

fn bound(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn numeric_set(items: &[Value]) -> CanonicalAnswer {
    let tokens: Vec<NumericToken> = items
        .iter()
        .filter(|v| !matches!(v, Value::Array(_) | Value::Object(_)))
        .filter_map(numeric_token)
        .collect();

    if tokens.is_empty() {
        CanonicalAnswer::Empty
    } else {
        CanonicalAnswer::NumericSet(tokens)
    }
}

fn normalize_numeric_reference(raw: &Value) -> CanonicalAnswer {
    match raw {
        Value::Array(items) => numeric_set(items),
        Value::Object(map) => {
            if let (Some(a), Some(b)) = (bound(map.get("min")), bound(map.get("max"))) {
                return CanonicalAnswer::NumericRange {
                    min: a.min(b),
                    max: a.max(b),
                };
            }
            if let Some(Value::Array(items)) = map.get("values") {
                return numeric_set(items);
            }
            match map.get("value") {
                Some(inner) if !inner.is_object() => normalize_numeric_reference(inner),
                _ => CanonicalAnswer::Empty,
            }
        }
        scalar => normalize_numeric(Some(scalar)),
    }
}
