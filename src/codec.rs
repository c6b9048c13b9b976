//! Restartable frame decoders for the two streaming formats in play.
//!
//! Network reads deliver arbitrary byte slices: a frame, a JSON value or
//! even a UTF-8 sequence may be split across reads. Both decoders buffer
//! raw bytes and only decode a frame once its delimiter has arrived.

use log::warn;

/// Splits a byte stream on a fixed delimiter, yielding complete frames.
#[derive(Debug)]
pub struct FrameDecoder {
    delimiter: &'static [u8],
    buffer: Vec<u8>,
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(delimiter: &'static [u8]) -> Self {
        Self { delimiter, buffer: Vec::new(), scanned: 0 }
    }

    /// Newline-delimited frames, as in Ollama's NDJSON stream.
    pub fn lines() -> Self {
        Self::new(b"\n")
    }

    /// Feeds one chunk and returns every frame it completed.
    /// Blank frames are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(end) = self.find_delimiter() {
            let rest = self.buffer.split_off(end + self.delimiter.len());
            let mut frame = std::mem::replace(&mut self.buffer, rest);
            frame.truncate(end);
            self.scanned = 0;
            if let Some(text) = Self::decode(frame) {
                frames.push(text);
            }
        }

        // Keep a tail that might be the start of a delimiter.
        self.scanned = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
        frames
    }

    /// Returns whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        Self::decode(rest)
    }

    fn find_delimiter(&self) -> Option<usize> {
        let len = self.delimiter.len();
        if self.buffer.len() < len {
            return None;
        }
        self.buffer[self.scanned..]
            .windows(len)
            .position(|w| w == self.delimiter)
            .map(|pos| pos + self.scanned)
    }

    fn decode(frame: Vec<u8>) -> Option<String> {
        match String::from_utf8(frame) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Dropping frame with invalid UTF-8: {}", e);
                None
            }
        }
    }
}

/// Decodes a `text/event-stream` body into `data` payloads.
#[derive(Debug)]
pub struct SseDecoder {
    frames: FrameDecoder,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self { frames: FrameDecoder::new(b"\n\n") }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.frames
            .push(chunk)
            .iter()
            .filter_map(|frame| data_payload(frame))
            .collect()
    }

    pub fn finish(&mut self) -> Option<String> {
        self.frames.finish().and_then(|frame| data_payload(&frame))
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins the `data:` lines of one event. Comments and other fields are ignored.
fn data_payload(frame: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(buf) => {
                buf.push('\n');
                buf.push_str(value);
            }
            None => {
                data = Some(value.to_string());
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks() {
        let mut decoder = FrameDecoder::lines();
        assert!(decoder.push(br#"{"response":"H"#).is_empty());
        let frames = decoder.push(b"i\"}\n{\"done\":true}\n");
        assert_eq!(frames, vec![r#"{"response":"Hi"}"#, r#"{"done":true}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut decoder = FrameDecoder::lines();
        let frames = decoder.push(b"\n\n  \na\n");
        assert_eq!(frames, vec!["a"]);
    }

    #[test]
    fn utf8_sequence_split_between_reads() {
        let bytes = "{\"response\":\"é\"}\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = FrameDecoder::lines();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["{\"response\":\"é\"}"]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut decoder = FrameDecoder::lines();
        assert!(decoder.push(br#"{"done":true}"#).is_empty());
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"done":true}"#));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn sse_delimiter_split_between_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"token\":\"Hi\"}\n").is_empty());
        assert_eq!(decoder.push(b"\ndata: {\"tok"), vec![r#"{"token":"Hi"}"#]);
        assert_eq!(decoder.push(b"en\":\" there\"}\n\n"), vec![r#"{"token":" there"}"#]);
    }

    #[test]
    fn sse_byte_at_a_time() {
        let body = b"data: {\"token\":\"a\"}\n\ndata: {\"done\":true,\"fullResponse\":\"a\"}\n\n";
        let mut decoder = SseDecoder::new();
        let mut payloads = Vec::new();
        for byte in body.iter() {
            payloads.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(payloads, vec![r#"{"token":"a"}"#, r#"{"done":true,"fullResponse":"a"}"#]);
    }

    #[test]
    fn sse_skips_comments_and_joins_data_lines() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\n\nevent: x\ndata: a\ndata: b\n\n");
        assert_eq!(payloads, vec!["a\nb"]);
    }
}
