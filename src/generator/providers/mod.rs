pub mod ollama;
pub mod openai;

use serde_json::Value;

/// Extracts text from an LLM response body shaped either as a single
/// string field or a list of `{type, text}`-style parts, concatenating
/// whichever text fragments are present (spec §4.6, response extraction).
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_plain_string() {
        assert_eq!(extract_text(&json!("hello")), "hello");
    }

    #[test]
    fn extracts_and_joins_part_list() {
        let content = json!([{"type": "text", "text": "hello "}, {"type": "text", "text": "world"}]);
        assert_eq!(extract_text(&content), "hello world");
    }

    #[test]
    fn unknown_shape_yields_empty_string() {
        assert_eq!(extract_text(&json!(42)), "");
    }
}
