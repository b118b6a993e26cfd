//! Incremental parser for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `message` when the server sent no `event:` field.
    pub event: String,
    pub data: String,
}

/// Accumulates raw body chunks and yields complete events.
///
/// Chunks may split lines (or UTF-8 sequences) anywhere; bytes are buffered
/// until a full line is available.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of the body, returning every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.line);
                let line = String::from_utf8_lossy(&raw);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(event) = self.process_line(line) {
                    events.push(event);
                }
            } else {
                self.line.push(byte);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {} // id, retry
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_then_message() {
        let mut parser = SseParser::new();
        let events = parser.feed(
            b"event: endpoint\ndata: /messages?sessionId=42\n\nevent: message\ndata: {\"id\":1}\n\n",
        );
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "endpoint".to_string(),
                    data: "/messages?sessionId=42".to_string()
                },
                SseEvent {
                    event: "message".to_string(),
                    data: "{\"id\":1}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: mess").is_empty());
        assert!(parser.feed(b"age\r\ndata: hel").is_empty());
        let events = parser.feed(b"lo\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_and_default_type() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_comments_and_empty_events_ignored() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b": keep-alive\n\n").is_empty());
        assert!(parser.feed(b"event: ping\n\n").is_empty());
        // the dangling event type must not leak into the next event
        let events = parser.feed(b"data: x\n\n");
        assert_eq!(events[0].event, "message");
    }
}
