//! LLM outputs are a weak contract (spec.md §9 "Prompt-as-interface"):
//! every response is plain text expected to contain one JSON object.
//! This module is the single place that turns that text into a typed
//! value or a task-level `ParseError`, so stages never hand-parse LLM
//! text themselves.

use scenepipe_core::PipelineError;
use serde::de::DeserializeOwned;

/// Parses `text` as JSON, tolerating a leading/trailing code fence
/// (```json ... ```) since LLMs routinely wrap JSON that way even when
/// asked not to.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, PipelineError> {
    let trimmed = strip_code_fence(text.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| PipelineError::ParseError(format!("could not parse LLM JSON output: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
    }

    #[test]
    fn parses_bare_json() {
        let parsed: Sample = parse_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(parsed, Sample { a: 1 });
    }

    #[test]
    fn strips_json_code_fence() {
        let parsed: Sample = parse_json("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(parsed, Sample { a: 2 });
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result: Result<Sample, _> = parse_json("not json at all");
        assert!(matches!(result, Err(PipelineError::ParseError(_))));
    }
}
