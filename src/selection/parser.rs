//! JSON extraction from model text.
//!
//! Models rarely answer with bare JSON; the payload usually sits inside a
//! fenced code block or between prose. Tool and resource selection differ in
//! how fences are treated, matching the prompts that produced the text.

use crate::selection::types::SelectionError;
use serde_json::Value;

const FENCE: &str = "```";
const PREVIEW_CHARS: usize = 120;

/// Extracts the tool-selection object: the first fenced block when one
/// exists, else the outermost braced span of the raw text.
pub fn extract_tool_json(text: &str) -> Result<Value, SelectionError> {
    let candidate = match first_fenced_block(text) {
        Some(block) => outer_braces(block),
        None => outer_braces(text),
    };
    parse_object(candidate, text)
}

/// Extracts the resource-selection object: fence markers are stripped
/// wholesale, then the outermost braced span is parsed.
pub fn extract_resource_json(text: &str) -> Result<Value, SelectionError> {
    let stripped = strip_fences(text);
    let value = parse_object(outer_braces(&stripped), text)?;
    Ok(value)
}

/// Contents of the first complete ``` block, language tag excluded.
fn first_fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)? + FENCE.len();
    let rest = &text[open..];
    // The opening line may carry a language tag ("```json").
    let body_start = rest.find('\n').map(|at| at + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let close = body.find(FENCE)?;
    Some(&body[..close])
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace(FENCE, "")
}

/// The span from the first `{` to the last `}`.
fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_object(candidate: Option<&str>, original: &str) -> Result<Value, SelectionError> {
    let span = candidate.ok_or_else(|| malformed(original))?;
    let value: Value = serde_json::from_str(span).map_err(|_| malformed(original))?;
    if !value.is_object() {
        return Err(malformed(original));
    }
    Ok(value)
}

fn malformed(text: &str) -> SelectionError {
    SelectionError::MalformedResponse(preview(text))
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_wins_over_surrounding_text() {
        let text = "Here is my choice:\n```json\n{\"serverName\": \"n8n\", \"toolName\": \"calculator\", \"arguments\": {}}\n```\nLet me know.";
        let value = extract_tool_json(text).expect("should extract");
        assert_eq!(value["toolName"], "calculator");
    }

    #[test]
    fn bare_braces_parse_without_a_fence() {
        let text = "I will pick {\"serverName\": \"n8n\", \"toolName\": \"weather\", \"arguments\": {\"location\": \"Oslo\"}} for this.";
        let value = extract_tool_json(text).expect("should extract");
        assert_eq!(value["arguments"]["location"], "Oslo");
    }

    #[test]
    fn unterminated_fence_falls_back_to_raw_braces() {
        let text = "```json\n{\"serverName\": \"n8n\", \"toolName\": \"calculator\", \"arguments\": {}}";
        let value = extract_tool_json(text).expect("should extract");
        assert_eq!(value["serverName"], "n8n");
    }

    #[test]
    fn resource_extraction_strips_every_fence() {
        let text = "```json\n{\"serverName\": \"n8n\",\n```\n```\n\"uri\": \"mcp://n8n/synthetic/calculator\"}\n```";
        let value = extract_resource_json(text).expect("should extract");
        assert_eq!(value["uri"], "mcp://n8n/synthetic/calculator");
    }

    #[test]
    fn prose_without_json_is_malformed() {
        let err = extract_tool_json("I could not find a suitable tool.")
            .expect_err("prose should fail");
        assert!(matches!(err, SelectionError::MalformedResponse(_)));
    }

    #[test]
    fn arrays_are_not_selections() {
        let err = extract_tool_json("[1, 2, 3]").expect_err("array should fail");
        assert!(matches!(err, SelectionError::MalformedResponse(_)));
    }

    #[test]
    fn previews_truncate_long_text() {
        let long = "x".repeat(500);
        match extract_tool_json(&long).expect_err("should fail") {
            SelectionError::MalformedResponse(preview) => {
                assert!(preview.chars().count() < 200);
                assert!(preview.ends_with("..."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
