//! Lenient decoding of model replies into typed predictions.
//!
//! Provider output is untrusted with respect to format. Replies arrive as
//! bare JSON, markdown-fenced JSON, JSON buried in prose, or loose
//! `Key: value` lines, and field names drift between template versions.
//! [`parse_reply`] tries each shape in turn and returns [`ParseFailure`]
//! (raw text preserved) instead of ever raising, so one malformed reply
//! never aborts a batch.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::types::{ParseFailure, Prediction};

// Key aliases recognized per field, after normalization (lowercase,
// spaces/dashes collapsed to underscores). The prefixed names come from the
// v1 prompt template, which models occasionally still echo.
const GENDER_KEYS: [&str; 2] = ["gender", "predicted_gender"];
const ORIGIN_KEYS: [&str; 2] = ["origin", "predicted_origin"];
const LANGUAGE_KEYS: [&str; 3] = ["language", "predicted_language", "deduced_language"];
const PERSONA_KEYS: [&str; 3] = ["persona", "user_persona", "predicted_persona"];
const CONFIDENCE_KEYS: [&str; 2] = ["confidence", "overall_confidence"];

// One `Key: value` (or `Key = value`) line, optionally bulleted or quoted.
static KEY_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*[-*]?\s*"?([A-Za-z][A-Za-z _-]*)"?\s*[:=]\s*(.+?)\s*$"#)
        .expect("Invalid regex: key-value line")
});

// First numeric token in a string, for replies like "0.9 (high)".
static FLOAT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("Invalid regex: float token"));

/// Decode a raw model reply into a [`Prediction`].
///
/// Matching is lenient: keys are case/whitespace tolerant, the confidence is
/// clamped into `[0.0, 1.0]` (missing or non-numeric values become `0.0`),
/// and markdown code fences are stripped before parsing. A reply in which
/// any of the four text fields cannot be located at all yields a
/// [`ParseFailure`] carrying the unmodified reply for diagnostics.
pub fn parse_reply(raw: &str) -> Result<Prediction, ParseFailure> {
    let cleaned = strip_code_fences(raw);

    if let Some(prediction) = parse_json_object(&cleaned) {
        return Ok(prediction);
    }

    // Models often wrap the object in prose; retry on the outermost braces.
    if let Some(snippet) = braced_snippet(&cleaned) {
        if let Some(prediction) = parse_json_object(snippet) {
            return Ok(prediction);
        }
    }

    if let Some(prediction) = parse_key_value_lines(&cleaned) {
        return Ok(prediction);
    }

    Err(ParseFailure::new(raw))
}

/// Remove markdown code fences the model may have wrapped around the body.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// The substring spanning the outermost `{` .. `}` pair, if any.
fn braced_snippet(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a strict-JSON object reply, in either the flat five-key shape or
/// the v1 shape where each field is a `{"value", "confidence"}` object.
fn parse_json_object(text: &str) -> Option<Prediction> {
    let parsed: Value = serde_json::from_str(text).ok()?;
    let object = parsed.as_object()?;

    let mut fields: HashMap<String, &Value> = HashMap::new();
    for (key, value) in object {
        fields.insert(normalize_key(key), value);
    }

    // Per-field confidences from the v1 shape; averaged when the reply
    // carries no overall confidence of its own.
    let mut field_confidences = Vec::new();
    let gender = json_text_field(&fields, &GENDER_KEYS, &mut field_confidences)?;
    let origin = json_text_field(&fields, &ORIGIN_KEYS, &mut field_confidences)?;
    let language = json_text_field(&fields, &LANGUAGE_KEYS, &mut field_confidences)?;
    let persona = json_text_field(&fields, &PERSONA_KEYS, &mut field_confidences)?;

    let confidence = lookup(&fields, &CONFIDENCE_KEYS)
        .and_then(json_confidence)
        .or_else(|| mean(&field_confidences))
        .unwrap_or(0.0);

    Some(Prediction {
        gender,
        origin,
        language,
        persona,
        confidence: clamp_confidence(confidence),
    })
}

/// Extract one text field from a decoded JSON object, accepting either a
/// plain string or a nested `{"value", "confidence"}` object.
fn json_text_field(
    fields: &HashMap<String, &Value>,
    keys: &[&str],
    confidences: &mut Vec<f64>,
) -> Option<String> {
    match lookup(fields, keys)? {
        Value::String(text) => non_blank(text),
        Value::Object(inner) => {
            if let Some(c) = object_get(inner, "confidence").and_then(json_confidence) {
                confidences.push(c);
            }
            match object_get(inner, "value")? {
                Value::String(text) => non_blank(text),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Scan loose `Key: value` lines, the shape models fall back to when they
/// ignore the JSON instruction.
fn parse_key_value_lines(text: &str) -> Option<Prediction> {
    let mut fields: HashMap<String, String> = HashMap::new();
    for captures in KEY_VALUE_LINE.captures_iter(text) {
        let value = unquote(&captures[2]);
        // Structured leftovers from a failed JSON parse are not field values.
        if value.starts_with('{') || value.starts_with('[') {
            continue;
        }
        fields.entry(normalize_key(&captures[1])).or_insert(value);
    }

    let gender = line_text_field(&fields, &GENDER_KEYS)?;
    let origin = line_text_field(&fields, &ORIGIN_KEYS)?;
    let language = line_text_field(&fields, &LANGUAGE_KEYS)?;
    let persona = line_text_field(&fields, &PERSONA_KEYS)?;

    let confidence = CONFIDENCE_KEYS
        .iter()
        .find_map(|key| fields.get(*key))
        .and_then(|value| parse_float(value))
        .unwrap_or(0.0);

    Some(Prediction {
        gender,
        origin,
        language,
        persona,
        confidence: clamp_confidence(confidence),
    })
}

fn line_text_field(fields: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key))
        .and_then(|value| non_blank(value))
}

/// Lowercase a key and collapse spaces/dashes so `"Predicted Gender"`,
/// `predicted-gender` and `predicted_gender` all compare equal.
fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Case-insensitive field access on a decoded JSON object.
fn object_get<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    object
        .iter()
        .find_map(|(k, v)| (normalize_key(k) == key).then_some(v))
}

fn lookup<'a>(fields: &HashMap<String, &'a Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| fields.get(*key).copied())
}

fn json_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

/// Parse a numeric confidence out of free text. Falls back to the first
/// numeric token so decorations like `"0.9 (high)"` still decode.
fn parse_float(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value);
    }
    FLOAT_TOKEN
        .find(trimmed)
        .and_then(|m| m.as_str().parse().ok())
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Strip one pair of surrounding quotes and any trailing comma, the residue
/// of JSON-ish lines like `"persona": "Tech Enthusiast",`.
fn unquote(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches(',').trim();
    let stripped = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    stripped.to_string()
}

/// Coerce a confidence into `[0.0, 1.0]`. Non-finite values (a `NaN` or
/// `inf` parsed from text) degrade to `0.0` rather than surviving the clamp.
fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ============================================================================
// Tests
// ============================================================================
