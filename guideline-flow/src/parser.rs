use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{FlowError, Result};

/// A citation emitted by the model. `page` stays a raw JSON scalar because
/// models emit both numbers and labels there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Parsed chat answer. Missing keys default rather than fail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Parse a model completion expected to carry a JSON value. If the raw text
/// does not parse directly, retry on the first-`{`-to-last-`}` substring,
/// since models routinely wrap JSON in prose or markdown fences.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            debug!("model output was not bare JSON, retrying on extracted object");
            return serde_json::from_str(&raw[start..=end])
                .map_err(|e| FlowError::MalformedOutput(e.to_string()));
        }
    }

    Err(FlowError::MalformedOutput(
        "no JSON object found in model output".to_string(),
    ))
}

/// Drop citations repeating an earlier (page, excerpt) signature, first
/// occurrence wins. An absent page and an explicit JSON null count as the
/// same signature.
pub fn dedup_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|citation| {
            let page = citation
                .page
                .as_ref()
                .filter(|v| !v.is_null())
                .map(Value::to_string);
            seen.insert((page, citation.excerpt.clone()))
        })
        .collect()
}

/// Parse a chat completion and deduplicate its citations.
pub fn parse_answer(raw: &str) -> Result<ParsedAnswer> {
    let mut parsed: ParsedAnswer = parse_model_json(raw)?;
    parsed.citations = dedup_citations(parsed.citations);
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn citation(page: Option<Value>, excerpt: &str) -> Citation {
        Citation {
            source: Some("NG12 PDF".into()),
            page,
            chunk_id: None,
            excerpt: Some(excerpt.into()),
        }
    }

    #[test]
    fn parses_bare_json() {
        let parsed = parse_answer(r#"{"answer": "yes", "citations": []}"#).unwrap();
        assert_eq!(parsed.answer, "yes");
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn repairs_fenced_json() {
        let raw = "```json\n{\"answer\": \"refer urgently\", \"citations\": []}\n```";
        let parsed = parse_answer(raw).unwrap();
        assert_eq!(parsed.answer, "refer urgently");
    }

    #[test]
    fn repairs_json_wrapped_in_prose() {
        let raw = "Here is the result: {\"answer\": \"ok\"} hope that helps";
        let parsed = parse_answer(raw).unwrap();
        assert_eq!(parsed.answer, "ok");
    }

    #[test]
    fn missing_keys_default() {
        let parsed = parse_answer("{}").unwrap();
        assert_eq!(parsed.answer, "");
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn non_json_output_is_an_error() {
        let err = parse_answer("not json").unwrap_err();
        assert!(matches!(err, FlowError::MalformedOutput(_)));
    }

    #[test]
    fn broken_extracted_object_is_an_error() {
        let err = parse_answer("prefix {\"answer\": } suffix").unwrap_err();
        assert!(matches!(err, FlowError::MalformedOutput(_)));
    }

    #[test]
    fn duplicate_citations_collapse_by_page_and_excerpt() {
        let citations = vec![
            citation(Some(json!(12)), "rule one"),
            citation(Some(json!(12)), "rule one"),
            citation(Some(json!(12)), "rule two"),
            citation(Some(json!(13)), "rule one"),
        ];

        let unique = dedup_citations(citations);
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn null_and_absent_pages_share_a_signature() {
        let citations = vec![
            citation(Some(Value::Null), "rule"),
            citation(None, "rule"),
        ];

        assert_eq!(dedup_citations(citations).len(), 1);
    }

    #[test]
    fn citation_pages_keep_their_json_type() {
        let parsed = parse_answer(
            r#"{"answer": "a", "citations": [{"page": 12, "excerpt": "x"}, {"page": "iv", "excerpt": "y"}]}"#,
        )
        .unwrap();

        assert_eq!(parsed.citations[0].page, Some(json!(12)));
        assert_eq!(parsed.citations[1].page, Some(json!("iv")));
    }
}
