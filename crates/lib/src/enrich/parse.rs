//! Parsing of the four-section JSON returned by the enrichment service.

use crate::errors::ResponseParseError;
use crate::types::{json_kind, EnrichedFields};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Prefix for each line rendered from a list-valued section.
pub const BULLET: &str = "• ";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

const DESCRIPTION_KEYS: [&str; 2] = ["Job Description", "job_description"];
const QUALIFICATIONS_KEYS: [&str; 2] = ["Qualifications Needed", "qualifications_needed"];
const RESPONSIBILITIES_KEYS: [&str; 2] = ["Job Responsibilities", "job_responsibilities"];
const BENEFITS_KEYS: [&str; 2] = ["Job Benefits", "job_benefits"];

/// Removes Markdown code-fence markers, keeping the text between them.
pub fn strip_code_fences(response: &str) -> String {
    CODE_FENCE.replace_all(response, "").trim().to_string()
}

/// Parses a service response into its four sections.
///
/// List values become one bulleted line per item, in order; other values are
/// trimmed strings. Missing sections are empty.
pub fn parse_enriched_response(api_response: &str) -> Result<EnrichedFields, ResponseParseError> {
    let cleaned = strip_code_fences(api_response);
    let data = match serde_json::from_str::<Value>(&cleaned)? {
        Value::Object(map) => map,
        other => return Err(ResponseParseError::NotAnObject(json_kind(&other))),
    };

    Ok(EnrichedFields {
        job_description: section(&data, &DESCRIPTION_KEYS),
        qualifications_needed: section(&data, &QUALIFICATIONS_KEYS),
        job_responsibilities: section(&data, &RESPONSIBILITIES_KEYS),
        job_benefits: section(&data, &BENEFITS_KEYS),
    })
}

fn section(data: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| data.get(*key))
        .map(render_value)
        .unwrap_or_default()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| format!("{BULLET}{}", render_scalar(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => render_scalar(other),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_response_with_lists() {
        let response = r#"```json
{
  "Job Description": "  Build and run data pipelines. ",
  "Qualifications Needed": [" SQL", "Python "],
  "Job Responsibilities": ["Own ETL", "Review code"],
  "Job Benefits": "Health insurance"
}
```"#;
        let fields = parse_enriched_response(response).unwrap();
        assert_eq!(fields.job_description, "Build and run data pipelines.");
        assert_eq!(fields.qualifications_needed, "• SQL\n• Python");
        assert_eq!(fields.job_responsibilities, "• Own ETL\n• Review code");
        assert_eq!(fields.job_benefits, "Health insurance");
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let fields = parse_enriched_response(r#"{"Job Description": "Short"}"#).unwrap();
        assert_eq!(fields.job_description, "Short");
        assert!(fields.qualifications_needed.is_empty());
        assert!(fields.job_benefits.is_empty());
    }

    #[test]
    fn test_snake_case_keys_are_accepted() {
        let fields =
            parse_enriched_response(r#"{"job_description": "d", "job_benefits": ["PTO"]}"#)
                .unwrap();
        assert_eq!(fields.job_description, "d");
        assert_eq!(fields.job_benefits, "• PTO");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            parse_enriched_response("**Job Description:** not json"),
            Err(ResponseParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_enriched_response("[1, 2]"),
            Err(ResponseParseError::NotAnObject("an array"))
        ));
    }
}
