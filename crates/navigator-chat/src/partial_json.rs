//! Best-effort parsing of incomplete JSON.
//!
//! Tool arguments arrive as JSON text split across many stream chunks.
//! `parse_partial_json` closes any open strings, arrays and objects so each
//! prefix can be shown to the caller as a value. Trailing fragments that
//! cannot be completed (a half-written key, a dangling comma) are dropped.

use serde_json::Value;

/// Parse `input`, completing it if it is a truncated JSON document.
///
/// Returns `None` when no prefix of the input forms a value.
pub fn parse_partial_json(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let mut end = trimmed.len();
    while end > 0 {
        if let Some(candidate) = complete(&trimmed[..end]) {
            if let Ok(value) = serde_json::from_str(&candidate) {
                return Some(value);
            }
        }
        end = previous_boundary(trimmed, end);
    }
    None
}

/// Append the closers needed to make `prefix` syntactically complete.
fn complete(prefix: &str) -> Option<String> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in prefix.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(c) {
                    return None;
                }
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(prefix.len() + closers.len() + 1);
    out.push_str(prefix);
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(c) = closers.pop() {
        out.push(c);
    }
    Some(out)
}

fn previous_boundary(s: &str, end: usize) -> usize {
    let mut i = end - 1;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_document() {
        assert_eq!(
            parse_partial_json(r#"{"city": "Austin", "state": "TX"}"#),
            Some(json!({"city": "Austin", "state": "TX"}))
        );
    }

    #[test]
    fn test_open_string_is_closed() {
        assert_eq!(
            parse_partial_json(r#"{"city": "Aus"#),
            Some(json!({"city": "Aus"}))
        );
    }

    #[test]
    fn test_dangling_separator_is_dropped() {
        assert_eq!(
            parse_partial_json(r#"{"city": "Austin", "#),
            Some(json!({"city": "Austin"}))
        );
        assert_eq!(
            parse_partial_json(r#"{"city": "Austin", "sta"#),
            Some(json!({"city": "Austin"}))
        );
        assert_eq!(parse_partial_json(r#"{"city": "#), Some(json!({})));
    }

    #[test]
    fn test_nested_containers() {
        assert_eq!(
            parse_partial_json(r#"{"places": [{"city": "Austin"}, {"city": "Da"#),
            Some(json!({"places": [{"city": "Austin"}, {"city": "Da"}]}))
        );
    }

    #[test]
    fn test_escape_at_cut_point() {
        assert_eq!(
            parse_partial_json(r##"{"note": "say \"hi\""##),
            Some(json!({"note": "say \"hi\""}))
        );
        assert_eq!(
            parse_partial_json(r#"{"note": "say \"hi\"#),
            Some(json!({"note": "say \"hi"}))
        );
        assert_eq!(
            parse_partial_json(r#"{"note": "a\"#),
            Some(json!({"note": "a"}))
        );
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            parse_partial_json(r#"{"city": "Zürich"#),
            Some(json!({"city": "Zürich"}))
        );
    }

    #[test]
    fn test_nothing_parseable() {
        assert_eq!(parse_partial_json(""), None);
        assert_eq!(parse_partial_json("   "), None);
        assert_eq!(parse_partial_json("nope"), None);
        assert_eq!(parse_partial_json("}"), None);
    }
}
