//! Output parsing
//!
//! Turns raw adapter strings into JSON values. A single raw output holding
//! an array is unwrapped into its elements when the task expects several
//! outputs; models routinely answer "give me 20 ideas" with one array, or
//! with an object whose only field is that array (`{"ideas": [...]}`).

use serde_json::Value;

use content_engine_core::{AdapterResponse, Error, ResponseFormat, Result};

/// Parse every raw output of `response` according to `format`
pub fn parse_outputs(
    response: &AdapterResponse,
    format: ResponseFormat,
    outputs_expected: u32,
) -> Result<Vec<Value>> {
    match format {
        ResponseFormat::Text => Ok(response
            .outputs
            .iter()
            .map(|raw| Value::String(raw.clone()))
            .collect()),
        ResponseFormat::Json => {
            let mut parsed = response
                .outputs
                .iter()
                .enumerate()
                .map(|(index, raw)| parse_json_output(raw, index))
                .collect::<Result<Vec<_>>>()?;

            if parsed.len() == 1 && outputs_expected > 1 {
                if let Some(items) = collection(&mut parsed[0]) {
                    return Ok(std::mem::take(items));
                }
            }

            Ok(parsed)
        }
    }
}

/// A bare array, or the array held by a single-field envelope object
fn collection(value: &mut Value) -> Option<&mut Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(fields) if fields.len() == 1 => match fields.values_mut().next() {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn parse_json_output(raw: &str, index: usize) -> Result<Value> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        Error::PipelineParse(format!("output {} is not valid JSON: {}", index, e))
    })
}

/// Strip a surrounding markdown code fence (```json ... ```), if any
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}
