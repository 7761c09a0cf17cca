//! Minimal SSE framing for the reasoning service stream.
//!
//! The service only uses `event:` and `data:` fields; comment lines are
//! skipped and a blank line terminates a frame.

/// One parsed SSE frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

/// Incremental frame parser: feed text chunks, collect completed frames.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: SseFrame,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.current.is_empty() {
                    frames.push(std::mem::take(&mut self.current));
                }
            } else {
                self.consume_line(line);
            }
        }

        frames
    }

    /// Flush the trailing frame once the transport closes.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let tail = std::mem::take(&mut self.buffer);
        let tail = tail.trim_end_matches(['\n', '\r']);
        if !tail.is_empty() {
            self.consume_line(tail);
        }
        if self.current.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.current))
        }
    }

    fn consume_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event = Some(value.to_string()),
            "data" => {
                if !self.current.data.is_empty() {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: {\"ev").is_empty());
        let frames = parser.push("ent\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"event\":1}");
    }

    #[test]
    fn multiline_data_joined_with_newline() {
        let mut parser = SseParser::new();
        let frames = parser.push("data: a\ndata: b\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn comments_skipped_and_event_field_kept() {
        let mut parser = SseParser::new();
        let frames = parser.push(": keepalive\nevent: message\ndata: hi\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
        assert_eq!(frames[0].data, "hi");
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: tail").is_empty());
        let frame = parser.finish().expect("trailing frame should flush");
        assert_eq!(frame.data, "tail");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn crlf_lines_are_handled() {
        let mut parser = SseParser::new();
        let frames = parser.push("data: one\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "one");
    }
}
