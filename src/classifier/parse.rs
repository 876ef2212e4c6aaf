//! Turning raw oracle text into a [`SemanticEstimate`].
//!
//! Models wrap JSON in markdown fences, prepend prose, or emit numbers as
//! strings. Parsing strips fences and tries the whole text first, then falls
//! back to the first balanced `{...}` block.

use serde_json::{Map, Value};

use super::{ClassifyError, Rationale, SemanticEstimate};
use crate::dimensions::{clamp_unit, PredictabilityLevel};

/// Remove a surrounding ```` ```json ... ``` ```` fence, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// First balanced JSON object in `raw`, ignoring braces inside strings.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let remainder = &raw[start..];
    find_matching_brace(remainder).map(|end| &remainder[..end])
}

fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parse oracle output into an estimate.
pub fn parse_estimate(raw: &str) -> Result<SemanticEstimate, ClassifyError> {
    let unfenced = strip_code_fences(raw);
    let object = parse_object(unfenced)
        .or_else(|| extract_json(unfenced).and_then(parse_object))
        .ok_or_else(|| {
            let preview: String = raw.chars().take(200).collect();
            ClassifyError::Parse(format!("no JSON object in classifier output: {preview:?}"))
        })?;

    Ok(estimate_from_object(&object))
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn estimate_from_object(object: &Map<String, Value>) -> SemanticEstimate {
    SemanticEstimate {
        t: number(field(object, &["T", "t"])).map(clamp_unit),
        c: number(field(object, &["C", "c"])).map(clamp_unit),
        l: number(field(object, &["L", "l"])).map(clamp_unit),
        level: number(field(object, &["level", "Level"]))
            .and_then(PredictabilityLevel::from_reported),
        note: text(object.get("note")),
        rationale: object.get("rationale").and_then(rationale_from_value),
    }
}

fn rationale_from_value(value: &Value) -> Option<Rationale> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(Rationale {
            overall: Some(s.trim().to_string()),
            ..Default::default()
        }),
        Value::Object(map) => {
            let cues = match map.get("cues") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            Some(Rationale {
                overall: text(map.get("overall")),
                t: text(field(map, &["T", "t"])),
                c: text(field(map, &["C", "c"])),
                l: text(field(map, &["L", "l"])),
                cues,
            })
        }
        _ => None,
    }
}
