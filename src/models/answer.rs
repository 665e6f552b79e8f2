// src/models/answer.rs

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

/// Raw learner answers.
/// Key: question id, or the question's position as a string when ids are absent.
/// Value: whatever the client sent (string, number, array, null).
pub type AnswerSheet = HashMap<String, Value>;

/// Answers as received on the wire: an object keyed by id/index, or a
/// positional array. The shape is kept so callers can re-key arrays against
/// the question list they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerPayload {
    Keyed(AnswerSheet),
    Positional(Vec<Value>),
}

impl Default for AnswerPayload {
    fn default() -> Self {
        AnswerPayload::Keyed(AnswerSheet::new())
    }
}

impl From<AnswerSheet> for AnswerPayload {
    fn from(sheet: AnswerSheet) -> Self {
        AnswerPayload::Keyed(sheet)
    }
}

impl<'de> Deserialize<'de> for AnswerPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        AnswerPayload::from_value(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl AnswerPayload {
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(AnswerPayload::default()),
            Value::Object(map) => Ok(AnswerPayload::Keyed(map.into_iter().collect())),
            Value::Array(items) => Ok(AnswerPayload::Positional(items)),
            other => Err(format!("answers must be an object or an array, got {}", other)),
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, AnswerPayload::Positional(_))
    }

    /// Positional entries become index keys ("0", "1", ...).
    pub fn into_sheet(self) -> AnswerSheet {
        match self {
            AnswerPayload::Keyed(sheet) => sheet,
            AnswerPayload::Positional(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
        }
    }

    /// Positional entries are keyed by the question id at the same position.
    /// Entries past the end of `ids` are dropped. Keyed sheets pass through.
    pub fn keyed_by(self, ids: &[i64]) -> AnswerSheet {
        match self {
            AnswerPayload::Keyed(sheet) => sheet,
            AnswerPayload::Positional(items) => ids
                .iter()
                .zip(items)
                .map(|(id, value)| (id.to_string(), value))
                .collect(),
        }
    }
}
