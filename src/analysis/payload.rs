//! Tolerant parsing of model replies
//!
//! Models wrap JSON in prose or code fences often enough that a strict parse
//! is not good enough.

use super::AnalysisFailure;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parses a JSON object out of a model reply
///
/// Tries the whole reply first, then the outermost `{ ... }` span.
///
/// # Examples
///
/// ```
/// use press_sieve::analysis::parse_structured_payload;
/// use serde_json::Value;
///
/// let reply = "Sure! ```json\n{\"summary\": \"ok\"}\n```";
/// let value: Value = parse_structured_payload(reply).unwrap();
/// assert_eq!(value["summary"], "ok");
/// ```
pub fn parse_structured_payload<T: DeserializeOwned>(raw: &str) -> Result<T, AnalysisFailure> {
    let trimmed = raw.trim();
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }

    let span = trimmed
        .find('{')
        .zip(trimmed.rfind('}'))
        .filter(|(start, end)| start < end)
        .map(|(start, end)| &trimmed[start..=end]);

    match span {
        Some(span) => serde_json::from_str(span)
            .map_err(|e| AnalysisFailure::MalformedPayload(format!("{e} in {}", preview(raw)))),
        None => Err(AnalysisFailure::MalformedPayload(format!(
            "no JSON object in {}",
            preview(raw)
        ))),
    }
}

/// Truncates to at most `max_chars` characters, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Fills `{name}` placeholders in one pass
///
/// Substituted values are never rescanned, and unknown placeholders are
/// left as written.
pub fn render_prompt(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Tags from a JSON array or a comma separated string
///
/// Tags are trimmed, empty ones dropped and duplicates removed without
/// regard to case; the first spelling wins.
pub fn normalize_tags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split([',', '，', '、']).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect()
}

fn preview(raw: &str) -> String {
    let short = truncate_chars(raw, 80);
    if short.len() < raw.len() {
        format!("'{short}...'")
    } else {
        format!("'{short}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_json() {
        let value: Value = parse_structured_payload(r#" {"a": 1} "#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_embedded_json_span() {
        let reply = "Here is the result:\n{\"summary\": \"x\", \"nested\": {\"k\": [1]}}\nThanks";
        let value: Value = parse_structured_payload(reply).unwrap();
        assert_eq!(value["nested"]["k"][0], 1);
    }

    #[test]
    fn test_malformed_payloads() {
        for reply in ["no json here", "} backwards {", "{\"unterminated\": "] {
            assert!(matches!(
                parse_structured_payload::<Value>(reply),
                Err(AnalysisFailure::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_truncate_chars_is_boundary_safe() {
        assert_eq!(truncate_chars("新闻正文内容", 2), "新闻");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_render_prompt_single_pass() {
        let rendered = render_prompt(
            "Title: {title}\nBody: {content}\nKeep {unknown} and {",
            &[("title", "About {content}"), ("content", "the body")],
        );
        assert_eq!(
            rendered,
            "Title: About {content}\nBody: the body\nKeep {unknown} and {"
        );
        assert_eq!(render_prompt("{a}{a}", &[("a", "x")]), "xx");
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(
            normalize_tags(&json!([" Rust ", "rust", "", "AI", 42])),
            vec!["Rust", "AI", "42"]
        );
        assert_eq!(normalize_tags(&json!("经济，金融, 经济")), vec!["经济", "金融"]);
        assert!(normalize_tags(&Value::Null).is_empty());
    }
}
