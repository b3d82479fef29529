//! Text contracts for completion-service responses.
//!
//! Responses are free text. Structured answers are expected to contain exactly
//! one JSON object somewhere in the prose; implementation answers carry a full
//! replacement body after a delimiter line. Nothing here panics on hostile
//! input: every failure is a [`ProtocolError`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{ProtocolError, Validate};

/// Locates and parses the JSON object embedded in `text`.
///
/// The first `{` anchors the search. The object is taken to be the balanced
/// span starting there (string literals and escapes are respected, so braces
/// inside strings do not count). If that span is missing or does not parse,
/// the span from the first `{` to the last `}` is tried instead.
pub fn extract_json_object(text: &str) -> Result<Value, ProtocolError> {
    let start = text.find('{').ok_or(ProtocolError::NoJsonObject)?;

    let mut last_error = None;
    let balanced = balanced_end(&text[start..]).map(|len| &text[start..start + len]);
    let greedy = text.rfind('}').filter(|&end| end > start).map(|end| &text[start..=end]);

    for candidate in [balanced, greedy].into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    match last_error {
        Some(reason) => Err(ProtocolError::MalformedJson { reason }),
        None if balanced.is_none() && greedy.is_none() => Err(ProtocolError::NoJsonObject),
        None => Err(ProtocolError::MalformedJson {
            reason: "embedded value is not an object".to_string(),
        }),
    }
}

/// Extracts the embedded JSON object and deserialises it strictly into `T`.
pub fn parse_structured<T>(text: &str) -> Result<T, ProtocolError>
where
    T: DeserializeOwned + Validate,
{
    let value = extract_json_object(text).inspect_err(|e| {
        debug!(error = %e, response_len = text.len(), "no usable JSON object in response");
    })?;
    let parsed: T = serde_json::from_value(value).map_err(|e| ProtocolError::InvalidField {
        reason: e.to_string(),
    })?;
    parsed
        .validate()
        .map_err(|reason| ProtocolError::InvalidField { reason })?;
    Ok(parsed)
}

/// Returns the trimmed body following `marker`, or `None` if the marker is
/// absent or nothing but whitespace follows it.
///
/// A Markdown code fence wrapped around the body is removed.
pub fn extract_delimited_body(text: &str, marker: &str) -> Option<String> {
    let at = text.find(marker)?;
    let body = text[at + marker.len()..].trim();
    let body = strip_code_fence(body).trim();
    (!body.is_empty()).then(|| body.to_string())
}

fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    // Drop the info string line (e.g. "```html").
    let rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    rest.trim_end().strip_suffix("```").unwrap_or(rest)
}

/// Length in bytes of the balanced `{...}` prefix of `s`, if it closes.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::AnalysisResult;

    #[test]
    fn finds_object_in_prose() {
        let text = "Sure! Here is my analysis:\n{\"a\": 1, \"b\": {\"c\": \"}\"}}\nHope this helps {really}.";
        assert_eq!(
            extract_json_object(text).unwrap(),
            json!({"a": 1, "b": {"c": "}"}})
        );
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_object() {
        let text = "```json\n{\"plan\": \"use {braces}\", \"n\": [1, 2]}\n```";
        assert_eq!(
            extract_json_object(text).unwrap(),
            json!({"plan": "use {braces}", "n": [1, 2]})
        );
    }

    #[test]
    fn no_object_is_a_protocol_error() {
        assert!(matches!(
            extract_json_object("I could not do that."),
            Err(ProtocolError::NoJsonObject)
        ));
    }

    #[test]
    fn unclosed_object_is_not_found() {
        assert!(matches!(
            extract_json_object("{ \"a\": 1"),
            Err(ProtocolError::NoJsonObject)
        ));
    }

    #[test]
    fn broken_object_is_malformed() {
        assert!(matches!(
            extract_json_object("{\"a\": }"),
            Err(ProtocolError::MalformedJson { .. })
        ));
    }

    #[test]
    fn strict_parse_rejects_missing_fields() {
        let err = parse_structured::<AnalysisResult>("{\"implementationPlan\": \"x\"}").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { .. }));
    }

    #[test]
    fn delimited_body_is_trimmed_and_unfenced() {
        let text = "Here you go\n<!-- UPDATED CODE -->\n```html\n<html></html>\n```\n";
        assert_eq!(
            extract_delimited_body(text, "<!-- UPDATED CODE -->").as_deref(),
            Some("<html></html>")
        );
    }

    #[test]
    fn missing_or_empty_body_is_none() {
        assert!(extract_delimited_body("<html></html>", "<!-- UPDATED CODE -->").is_none());
        assert!(extract_delimited_body("<!-- UPDATED CODE -->   \n", "<!-- UPDATED CODE -->").is_none());
    }
}
