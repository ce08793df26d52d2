use bytes::Bytes;
use serde_json::{json, Value};

/// Wrap a JSON payload as an `event: debug` SSE frame.
fn frame(payload: &Value) -> Bytes {
    Bytes::from(format!("event: debug\ndata: {}\n\n", payload))
}

/// Pre-flight description of the outbound request.
pub fn request_frame(
    url: &str,
    model: &str,
    messages: &[Value],
    referer: &str,
    reasoning: Option<&Value>,
) -> Bytes {
    frame(&json!({
        "type": "request",
        "url": url,
        "model": model,
        "message_count": messages.len(),
        "messages": messages,
        "referer": referer,
        "reasoning": reasoning,
    }))
}

pub fn error_frame(status: u16, detail: &str) -> Bytes {
    frame(&json!({
        "type": "response_error",
        "status": status,
        "body": detail,
    }))
}

pub fn summary_frame(status: u16, assistant_chars: usize) -> Bytes {
    frame(&json!({
        "type": "response_summary",
        "status": status,
        "assistant_chars": assistant_chars,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_debug_events() {
        let bytes = summary_frame(200, 5);
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("event: debug\ndata: "));
        assert!(text.ends_with("\n\n"));

        let payload: Value =
            serde_json::from_str(text.trim_end().strip_prefix("event: debug\ndata: ").unwrap())
                .unwrap();
        assert_eq!(payload["type"], "response_summary");
        assert_eq!(payload["assistant_chars"], 5);
    }

    #[test]
    fn request_frame_reports_message_count() {
        let messages = vec![json!({"role": "user", "content": "hi"})];
        let bytes = request_frame("http://u", "m", &messages, "http://r", None);
        let text = std::str::from_utf8(&bytes).unwrap();
        let payload: Value =
            serde_json::from_str(text.trim_end().strip_prefix("event: debug\ndata: ").unwrap())
                .unwrap();
        assert_eq!(payload["message_count"], 1);
        assert_eq!(payload["reasoning"], Value::Null);
    }
}
