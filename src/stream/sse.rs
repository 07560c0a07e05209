//! SSE (Server-Sent Events) frame parser.
//!
//! Handles buffering partial lines and field semantics per the
//! [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html).
//! The transport hands over body text in arbitrary chunk boundaries; the
//! parser yields complete frames for the provider facade to decode.

use memchr::memchr_iter;

/// A parsed SSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseEvent {
    /// An unnamed `data:` frame, the shape `OpenAI` and Gemini stream.
    #[must_use]
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// A named frame, the shape Anthropic streams.
    #[must_use]
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            ..Default::default()
        }
    }

    /// `OpenAI` terminates streams with `data: [DONE]`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Parse one complete frame from raw text, terminated or not.
#[must_use]
pub fn parse_sse_frame(raw: &str) -> Option<SseEvent> {
    let mut parser = SseParser::new();
    let mut events = parser.feed(raw);
    if events.is_empty() {
        return parser.finish();
    }
    Some(events.swap_remove(0))
}

/// Incremental SSE line parser.
///
/// Feed it raw text chunks (potentially arriving in arbitrary byte
/// boundaries) and it yields fully-assembled [`SseEvent`] frames.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data_buffer: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<u64>,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text and return any complete events parsed.
    ///
    /// - `event:` sets the event type for the next frame
    /// - `data:` appends to the data buffer (one leading space stripped);
    ///   multiple `data:` lines are joined with `\n`
    /// - an empty line terminates a frame
    /// - lines starting with `:` are comments
    /// - `id:` sets the last event ID, which sticks to later frames
    /// - `retry:` is surfaced on the next frame when it parses as an integer
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let buffer = std::mem::take(&mut self.buffer);
        for rel_pos in memchr_iter(b'\n', &buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &buffer[processed_up_to..line_end];
            self.process_line(line.strip_suffix('\r').unwrap_or(line), out);
            processed_up_to = line_end + 1;
        }
        self.buffer = buffer;

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing frame whose terminating blank line never arrived.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.read_offset < self.buffer.len() {
            let rest = self.buffer[self.read_offset..].to_string();
            let mut out = Vec::new();
            self.process_line(rest.strip_suffix('\r').unwrap_or(&rest), &mut out);
            self.buffer.clear();
            self.read_offset = 0;
        }
        let mut out = Vec::with_capacity(1);
        self.process_line("", &mut out);
        out.pop()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            if self.has_data {
                events.push(SseEvent {
                    event: self.event_type.take(),
                    data: std::mem::take(&mut self.data_buffer),
                    id: self.last_event_id.clone(),
                    retry: self.retry.take(),
                });
                self.has_data = false;
            } else {
                self.event_type = None;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.data_buffer.push('\n');
                } else {
                    self.has_data = true;
                }
                self.data_buffer.push_str(value);
            }
            "event" => self.event_type = Some(value.to_string()),
            "id" => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            other => tracing::trace!(field = other, "ignoring unknown SSE field"),
        }
    }
}
