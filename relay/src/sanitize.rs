use serde_json::Value;

/// Drop messages that cannot be sent upstream: any whose `content` is not a
/// string, and assistant placeholders whose content trims to empty. The
/// relative order of the survivors is unchanged.
pub fn sanitize_messages(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter(|m| {
            let role = m.get("role").and_then(Value::as_str);
            let content = m.get("content").and_then(Value::as_str);
            match (role, content) {
                (_, None) => false,
                (Some("assistant"), Some(c)) => !c.trim().is_empty(),
                (_, Some(_)) => true,
            }
        })
        .cloned()
        .collect()
}

/// Text logged alongside the request: every `user` message whose content is
/// a string, joined with blank lines. Operates on the unsanitized list, like
/// the raw body stored next to it.
pub fn joined_user_text(raw: &[Value]) -> Option<String> {
    let parts: Vec<&str> = raw
        .iter()
        .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .filter_map(|m| m.get("content").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_empty_assistant_placeholders() {
        let raw = vec![
            json!({"role": "user", "content": "hi"}),
            json!({"role": "assistant", "content": ""}),
            json!({"role": "assistant", "content": "   "}),
            json!({"role": "assistant", "content": null}),
            json!({"role": "assistant"}),
        ];
        let out = sanitize_messages(&raw);
        assert_eq!(out, vec![json!({"role": "user", "content": "hi"})]);
    }

    #[test]
    fn drops_non_string_content() {
        let raw = vec![
            json!({"role": "user", "content": ["block"]}),
            json!({"role": "user", "content": 42}),
            json!({"role": "user"}),
            json!({"role": "user", "content": "kept"}),
        ];
        let out = sanitize_messages(&raw);
        assert_eq!(out, vec![json!({"role": "user", "content": "kept"})]);
    }

    #[test]
    fn keeps_whitespace_only_user_content() {
        // Only assistant placeholders are trimmed away.
        let raw = vec![json!({"role": "user", "content": "  "})];
        assert_eq!(sanitize_messages(&raw).len(), 1);
    }

    #[test]
    fn preserves_relative_order() {
        let raw = vec![
            json!({"role": "system", "content": "s"}),
            json!({"role": "assistant", "content": ""}),
            json!({"role": "user", "content": "u1"}),
            json!({"role": "assistant", "content": "a1"}),
            json!({"role": "user", "content": "u2"}),
        ];
        let out = sanitize_messages(&raw);
        let contents: Vec<&str> = out
            .iter()
            .map(|m| m.get("content").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(contents, vec!["s", "u1", "a1", "u2"]);
    }

    #[test]
    fn joins_user_contents_with_blank_lines() {
        let raw = vec![
            json!({"role": "user", "content": "first"}),
            json!({"role": "assistant", "content": "reply"}),
            json!({"role": "user", "content": "second"}),
        ];
        assert_eq!(joined_user_text(&raw).as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn joined_user_text_skips_non_string_content() {
        let raw = vec![
            json!({"role": "user", "content": ["block"]}),
            json!({"role": "user", "content": "plain"}),
        ];
        assert_eq!(joined_user_text(&raw).as_deref(), Some("plain"));
    }

    #[test]
    fn joined_user_text_empty_when_no_user_messages() {
        let raw = vec![json!({"role": "system", "content": "s"})];
        assert_eq!(joined_user_text(&raw), None);
        assert_eq!(joined_user_text(&[]), None);
    }
}
