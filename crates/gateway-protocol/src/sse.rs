use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental parser for `text/event-stream` bodies. Handles the
/// `data:`/`event:` line forms and the blank-line event terminator.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        match std::str::from_utf8(chunk) {
            Ok(text) => self.push_str(text),
            Err(_) => Vec::new(),
        }
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let mut line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);

            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                self.finish_event(&mut events);
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() { None } else { Some(value.to_string()) };
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                let value = value.trim_start();
                self.data_lines.push(value.to_string());
                continue;
            }
        }

        events
    }

    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let mut line = std::mem::take(&mut self.buffer);
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data_lines.push(value.trim_start().to_string());
            }
        }
        self.finish_event(&mut events);
        events
    }

    fn finish_event(&mut self, events: &mut Vec<SseEvent>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        events.push(SseEvent { event: self.event.take(), data });
        self.data_lines.clear();
    }
}

/// Frames one JSON value as a `data: <json>\n\n` chunk.
pub fn encode_data_event(json: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json))
}

/// The terminal `data: [DONE]\n\n` event.
pub fn done_event() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_event_per_blank_line() {
        let mut parser = SseParser::new();
        let events = parser.push_str("data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].data, "{\"b\":2}");
    }

    #[test]
    fn flushes_trailing_buffer_on_finish() {
        let mut parser = SseParser::new();
        assert!(parser.push_str("data: partial").is_empty());
        let events = parser.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn done_event_is_literal() {
        assert_eq!(&done_event()[..], b"data: [DONE]\n\n");
    }
}
