//! Line codec for the host, modem and cloud links
//!
//! All three links carry text lines:
//! ```text
//! [ N bytes: line ][ "\r\n" or "\n" ]
//! ```
//!
//! The decoder accumulates raw reads and yields one complete line at a time,
//! without its terminator.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::limits::MAX_LINE_LEN;

/// Errors that can occur during decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Line too long: {0} bytes without terminator (max: {MAX_LINE_LEN})")]
    LineTooLong(usize),
}

/// Decoder state for streaming decoding
///
/// Yields one complete line per call. A line that grows past
/// [`MAX_LINE_LEN`] is reported once and then skipped through its
/// terminator, even when the terminator arrives in a later read.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
    /// Skipping the rest of an over-long line
    discarding: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_LINE_LEN),
            discarding: false,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next line from the buffer
    ///
    /// Returns:
    /// - `Ok(Some(line))` if a complete line was consumed
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the pending line exceeds [`MAX_LINE_LEN`]
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        let newline = self.buffer.iter().position(|&b| b == b'\n');

        if self.discarding {
            match newline {
                Some(pos) => {
                    self.buffer.advance(pos + 1);
                    self.discarding = false;
                    return self.decode_next();
                }
                None => {
                    self.buffer.clear();
                    return Ok(None);
                }
            }
        }

        match newline {
            Some(pos) if pos > MAX_LINE_LEN => {
                self.buffer.advance(pos + 1);
                Err(CodecError::LineTooLong(pos))
            }
            Some(pos) => {
                let line = self.buffer.split_to(pos + 1);
                let text = String::from_utf8_lossy(&line[..pos]);
                Ok(Some(text.trim_end_matches('\r').to_string()))
            }
            None if self.buffer.len() > MAX_LINE_LEN => {
                let len = self.buffer.len();
                self.buffer.clear();
                self.discarding = true;
                Err(CodecError::LineTooLong(len))
            }
            None => Ok(None),
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
