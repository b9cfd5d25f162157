//! Server-Sent Events decoding.
//!
//! UTF-8, lines terminated by `\n`, records separated by blank lines,
//! data lines prefixed `data: `. Incremental: bytes arrive in arbitrary
//! chunk boundaries and complete records are surfaced as they close.

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the data payload of every record completed
    /// by this chunk, in order. Multiple `data:` lines within one
    /// record are joined with `\n` per the SSE spec.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..boundary.saturating_add(2)).collect();
            if let Some(payload) = Self::decode_record(&record) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Extract the joined data payload of one record, if it has any.
    fn decode_record(record: &str) -> Option<String> {
        let mut data_lines = Vec::new();
        for line in record.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                data_lines.push(data);
            } else if let Some(data) = line.strip_prefix("data:") {
                data_lines.push(data.trim_start());
            }
        }
        if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        }
    }

    /// Whether a partial record is still buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert!(decoder.has_partial());
        let payloads = decoder.push(b":1}\n\ndata: [DONE]\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_event_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"event: message_start\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"b\":2}"]);
    }

    #[test]
    fn test_multiple_data_lines_joined() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(payloads, vec!["line1\nline2"]);
    }

    #[test]
    fn test_comment_only_record_skipped() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\n\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_many_records_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: 1\n\ndata: 2\n\ndata: 3\n\n");
        assert_eq!(payloads, vec!["1", "2", "3"]);
    }
}
