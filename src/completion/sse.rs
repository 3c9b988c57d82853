//! Incremental server-sent events decoder
//!
//! Bytes go in as they arrive from the network; complete events come out
//! once their terminating blank line has been seen. Multi-byte characters
//! split across network chunks are reassembled before decoding.

/// One decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Value of the `id:` field, if present
    pub id: Option<String>,
}

/// Buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// The previous chunk ended on `\r`, so a leading `\n` belongs to it
    after_cr: bool,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every event it completes
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::completion::sse::SseDecoder;
    ///
    /// let mut decoder = SseDecoder::new();
    /// assert!(decoder.push(b"data: hel").is_empty());
    /// let events = decoder.push(b"lo\n\n");
    /// assert_eq!(events[0].data, "hello");
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CRLF, lone CR and LF line endings all become LF
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }

        let mut events = Vec::new();
        while let Some(pos) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        let block = std::mem::take(&mut self.buffer);
        self.after_cr = false;
        parse_block(&block)
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse one event block (the text between two blank lines)
fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        // Lines starting with `:` are comments
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => data_lines.push(value),
            "event" => event.event = Some(value.to_string()),
            "id" => event.id = Some(value.to_string()),
            // `retry:` and unknown fields are ignored
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    event.data = data_lines.join("\n");
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: first\n").is_empty());
        let events = decoder.push(b"\ndata: second\n\n");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["first", "second"]);
    }

    #[test]
    fn test_crlf_framing() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_bare_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: a\rdata: b\r\rdata: c\r\r");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a\nb", "c"]);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: a\r").is_empty());
        assert!(decoder.push(b"\ndata: b\r").is_empty());
        let events = decoder.push(b"\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_multiline_data_and_id() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"id: 7\ndata: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_comments_and_dataless_blocks_are_dropped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: ping\n\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        // Split inside the two-byte encoding of 'é'
        let split = bytes.len() - 3;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(events[0].data, "caf\u{e9}");
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().unwrap().data, "[DONE]");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_value_keeps_inner_spaces() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data:  two leading\n\n");
        assert_eq!(events[0].data, " two leading");
    }
}
