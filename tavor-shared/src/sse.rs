//! Incremental Server-Sent Events parser.
//!
//! The command stream arrives in fragments whose boundaries carry no meaning:
//! a fragment may end inside a field name, inside a data payload, between the
//! two newlines that close a record, or in the middle of a UTF-8 sequence.
//! [`SseParser`] buffers whatever is incomplete and only yields whole records.
//!
//! ```
//! use tavor_shared::sse::SseParser;
//!
//! let mut parser = SseParser::new();
//! assert_eq!(parser.feed("event: out").count(), 0);
//! let events: Vec<_> = parser.feed("put\ndata: {\"stdout\":\"hi\"}\n\n").collect();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event, "output");
//! assert_eq!(events[0].data, "{\"stdout\":\"hi\"}");
//! ```

use crate::constants::events;

/// One dispatched SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, or `message` when absent.
    pub event: String,
    /// All `data:` lines of the record joined with `\n`.
    pub data: String,
}

/// Stateful SSE frame parser.
///
/// Line terminators are `\n` and `\r\n`. Comment lines and fields other than
/// `event` and `data` are ignored. JSON is never decoded here.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Decoded text not yet split into lines. Bytes before `cursor` are consumed.
    buffer: String,
    cursor: usize,
    /// Tail of a UTF-8 sequence split across `feed_bytes` calls.
    partial_utf8: Vec<u8>,
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text fragment and iterate the records it completes.
    ///
    /// Records not pulled from the returned iterator stay buffered and are
    /// yielded by the next call.
    pub fn feed(&mut self, chunk: &str) -> SseEvents<'_> {
        self.compact();
        self.buffer.push_str(chunk);
        SseEvents { parser: self }
    }

    /// Append raw bytes, decoding UTF-8 incrementally.
    ///
    /// Invalid sequences become U+FFFD; an incomplete trailing sequence waits
    /// for the next fragment.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> SseEvents<'_> {
        self.compact();
        self.decode(chunk);
        SseEvents { parser: self }
    }

    /// True when buffered input has not yet formed a complete record.
    pub fn has_pending(&self) -> bool {
        self.cursor < self.buffer.len()
            || !self.partial_utf8.is_empty()
            || self.event.is_some()
            || self.has_data
    }

    fn compact(&mut self) {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
    }

    fn decode(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.partial_utf8 = tail.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(offset) = self.buffer[self.cursor..].find('\n') {
            let start = self.cursor;
            let end = start + offset;
            self.cursor = end + 1;

            let raw = &self.buffer[start..end];
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Some(event);
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => {
                    if self.has_data {
                        self.data.push('\n');
                    }
                    self.data.push_str(value);
                    self.has_data = true;
                }
                _ => {}
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event.is_none() && !self.has_data {
            return None;
        }

        self.has_data = false;
        Some(SseEvent {
            event: self
                .event
                .take()
                .unwrap_or_else(|| events::DEFAULT.to_string()),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Lazy iterator over records completed by one `feed` call.
pub struct SseEvents<'a> {
    parser: &'a mut SseParser,
}

impl Iterator for SseEvents<'_> {
    type Item = SseEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_event()
    }
}
