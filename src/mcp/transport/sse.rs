//! Incremental `text/event-stream` decoding.

/// Event name the server uses to announce where client messages go.
pub const ENDPOINT_EVENT: &str = "endpoint";
/// Event name carrying a JSON-RPC payload. Unnamed events mean the same.
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn is_endpoint(&self) -> bool {
        self.event.as_deref() == Some(ENDPOINT_EVENT)
    }

    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some(MESSAGE_EVENT))
    }
}

/// Accumulates raw bytes and yields complete events.
///
/// Chunks may split lines and events anywhere; nothing is emitted until the
/// blank line that terminates an event arrives.
#[derive(Default)]
pub struct SseEventBuffer {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseEventBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let mut line_end = newline_index;
            if line_end > search_index && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line = String::from_utf8_lossy(&self.buffer[search_index..line_end]).into_owned();
            search_index = newline_index + 1;
            if let Some(event) = self.apply_line(&line) {
                events.push(event);
            }
        }

        if search_index > 0 {
            self.buffer.drain(..search_index);
        }
        events
    }

    /// Flushes a trailing event when the stream ends without a final blank
    /// line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.apply_line(line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn apply_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}
