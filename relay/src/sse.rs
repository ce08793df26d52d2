use serde_json::Value;

/// Incremental SSE decoder that collects assistant text from streamed
/// completion frames.
///
/// Raw network chunks go in; complete frames (terminated by a blank line)
/// are taken apart into their `data:` payloads and the extracted delta text
/// is appended to a running accumulator. Incomplete trailing data stays
/// buffered, so arbitrary chunk boundaries never change the result.
pub struct SseAccumulator {
    buffer: String,
    text: String,
}

impl SseAccumulator {
    pub fn new() -> Self {
        SseAccumulator {
            buffer: String::new(),
            text: String::new(),
        }
    }

    /// Feed one chunk of the upstream byte stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        while let Some(pos) = self.buffer.find("\n\n") {
            let frame = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + 2);
            self.consume_frame(&frame);
        }
    }

    fn consume_frame(&mut self, frame: &str) {
        for line in frame.lines() {
            let Some(rest) = line.strip_prefix("data:") else {
                continue;
            };
            let data = rest.strip_prefix(' ').unwrap_or(rest);
            if data.is_empty() || data == "[DONE]" {
                continue;
            }
            // Non-JSON data lines are dropped; a malformed upstream frame
            // must not abort the relay.
            let Ok(json) = serde_json::from_str::<Value>(data) else {
                continue;
            };
            if let Some(delta) = extract_text(&json) {
                self.text.push_str(delta);
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Probe the places OpenRouter-compatible providers put incremental
/// assistant text; first match wins.
fn extract_text(json: &Value) -> Option<&str> {
    let choice = json.get("choices").and_then(|c| c.get(0));
    if let Some(s) = choice
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        return Some(s);
    }
    if let Some(s) = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return Some(s);
    }
    json.get("content").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_delta_content() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n");
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(acc.text(), "Hello");
    }

    #[test]
    fn chunk_boundaries_do_not_change_result() {
        let stream = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
            data: {\"choices\":[{\"delta\":{\"content\":\"lo \"}}]}\n\n\
            data: {\"choices\":[{\"delta\":{\"content\":\"world\"}}]}\n\ndata: [DONE]\n\n";

        let mut whole = SseAccumulator::new();
        whole.feed(stream);

        // Byte-at-a-time delivery must accumulate the same text.
        let mut dribble = SseAccumulator::new();
        for byte in stream.iter() {
            dribble.feed(std::slice::from_ref(byte));
        }
        assert_eq!(dribble.text(), whole.text());

        // As must every two-way split of the stream.
        for split in 0..stream.len() {
            let mut acc = SseAccumulator::new();
            acc.feed(&stream[..split]);
            acc.feed(&stream[split..]);
            assert_eq!(acc.text(), whole.text(), "split at {}", split);
        }
    }

    #[test]
    fn done_and_empty_payloads_contribute_nothing() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: [DONE]\n\ndata:\n\ndata: \n\n");
        assert_eq!(acc.text(), "");
        assert_eq!(acc.char_count(), 0);
    }

    #[test]
    fn malformed_json_is_skipped() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {not json\n\ndata: {\"content\":\"ok\"}\n\n");
        assert_eq!(acc.text(), "ok");
    }

    #[test]
    fn message_content_fallback() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"choices\":[{\"message\":{\"content\":\"full\"}}]}\n\n");
        assert_eq!(acc.text(), "full");
    }

    #[test]
    fn top_level_content_fallback() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"content\":\"plain\"}\n\n");
        assert_eq!(acc.text(), "plain");
    }

    #[test]
    fn delta_takes_precedence_over_message() {
        let mut acc = SseAccumulator::new();
        acc.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"message\":{\"content\":\"b\"}}]}\n\n",
        );
        assert_eq!(acc.text(), "a");
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"content\":\"x\"}");
        assert_eq!(acc.text(), "");
        acc.feed(b"\n\n");
        assert_eq!(acc.text(), "x");
    }

    #[test]
    fn multiple_data_lines_in_one_frame() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"event: message\ndata: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\n\n");
        assert_eq!(acc.text(), "ab");
    }

    #[test]
    fn comment_and_event_lines_are_ignored() {
        let mut acc = SseAccumulator::new();
        acc.feed(b": ping\n\nevent: debug\ndata: {\"content\":\"c\"}\n\n");
        assert_eq!(acc.text(), "c");
    }

    #[test]
    fn non_string_content_is_ignored() {
        let mut acc = SseAccumulator::new();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":42}}]}\n\n");
        assert_eq!(acc.text(), "");
    }
}
