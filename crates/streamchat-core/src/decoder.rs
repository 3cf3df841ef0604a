//! Incremental UTF-8 decoding for streamed response bodies.
//!
//! Network chunks don't respect character boundaries, so a multi-byte
//! character can arrive split across two reads. [`Utf8Decoder`] holds the
//! incomplete tail of one chunk and completes it with the next one.

use crate::error::StreamError;

const REPLACEMENT: char = '\u{FFFD}';
const BOM: char = '\u{FEFF}';

#[derive(Debug)]
pub struct Utf8Decoder {
    /// Start of a character whose remaining bytes haven't arrived yet (at most 3 bytes).
    pending: Vec<u8>,
    /// Bytes fully decoded so far, excluding `pending`.
    offset: usize,
    strict: bool,
    at_start: bool,
}

impl Utf8Decoder {
    /// Lossy decoder: invalid sequences become U+FFFD.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            offset: 0,
            strict: false,
            at_start: true,
        }
    }

    /// Decoder that fails on the first invalid sequence.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::new()
        }
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode the next chunk, completing any character left over from the previous one.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, StreamError> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));

                    match err.error_len() {
                        // Truncated at the end of the chunk: wait for more bytes.
                        None => {
                            self.pending = rest[valid_up_to..].to_vec();
                            rest = &rest[valid_up_to..];
                            break;
                        }
                        Some(len) => {
                            if self.strict {
                                let position = buf.len() - rest.len() + valid_up_to;
                                return Err(StreamError::Decode {
                                    offset: self.offset + position,
                                });
                            }
                            out.push(REPLACEMENT);
                            rest = &rest[valid_up_to + len..];
                        }
                    }
                }
            }
        }

        self.offset += buf.len() - rest.len();
        Ok(self.strip_bom(out))
    }

    /// Flush at end of stream. A character that never completed is an error in
    /// strict mode and a single U+FFFD otherwise.
    pub fn finish(&mut self) -> Result<String, StreamError> {
        if self.pending.is_empty() {
            return Ok(String::new());
        }

        let truncated = std::mem::take(&mut self.pending);
        if self.strict {
            return Err(StreamError::Decode {
                offset: self.offset,
            });
        }

        self.offset += truncated.len();
        Ok(self.strip_bom(REPLACEMENT.to_string()))
    }

    fn strip_bom(&mut self, mut text: String) -> String {
        if self.at_start && !text.is_empty() {
            self.at_start = false;
            if text.starts_with(BOM) {
                text.drain(..BOM.len_utf8());
            }
        }
        text
    }
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::new()
    }
}
