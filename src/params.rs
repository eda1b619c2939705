//! Purpose: Lenient field decoders for snippet params.
//! Exports: `number`, `text`.
//! Role: Used via `#[serde(deserialize_with = ...)]` so form-style clients may
//! send numbers as strings and strings as numbers.
//! Invariants: The Rust field type stays the semantic type the catalogue reports.
use serde::Deserialize;
use serde::de::{self, Deserializer, Unexpected};
use serde_json::Value;

const EXPECTED_NUMBER: &str = "a number or numeric string";
const EXPECTED_TEXT: &str = "a string or number";

/// Decode a JSON number, or a string holding one, into `f64`.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&text), &EXPECTED_NUMBER)),
        other => Err(de::Error::invalid_type(unexpected(&other), &EXPECTED_NUMBER)),
    }
}

/// Decode a JSON string as-is, or render a JSON number as its decimal text.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(de::Error::invalid_type(unexpected(&other), &EXPECTED_TEXT)),
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(flag) => Unexpected::Bool(*flag),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(text) => Unexpected::Str(text),
    }
}
