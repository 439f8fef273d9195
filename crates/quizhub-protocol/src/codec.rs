//! Line framing: one JSON value per `\n`-terminated line.
//!
//! TCP hands us bytes in arbitrary chunks. A single `recv` may contain
//! half a message, three messages, or the tail of one and the head of
//! the next. [`LineDecoder`] buffers those chunks and hands back whole
//! values as soon as their terminating newline arrives.
//!
//! ```text
//! chunk 1: {"type":"PI          -> (nothing yet)
//! chunk 2: NG"}\n{"type":"HE    -> [PING]
//! chunk 3: LLO"}\n              -> [HELLO]
//! ```

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Envelope, ProtocolError};

/// Longest line the decoder will buffer before giving up on it.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Serializes `value` as compact JSON followed by a single `\n`.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = serde_json::to_vec(value).map_err(ProtocolError::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Incremental decoder for newline-delimited JSON.
///
/// Lines that are blank, not UTF-8, or not valid `T` are dropped with a
/// debug log; a bad line never poisons the lines after it. A line longer
/// than the limit is discarded up to its newline.
///
/// The type parameter defaults to [`Envelope`], which is what the server
/// reads. The gateway decodes into `Box<serde_json::value::RawValue>`
/// instead, which keeps each line's original text.
pub struct LineDecoder<T = Envelope> {
    buf: Vec<u8>,
    max_line: usize,
    discarding: bool,
    // `fn() -> T` keeps the decoder `Send + Sync` regardless of `T`.
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LineDecoder<T> {
    /// Creates a decoder with the default [`MAX_LINE_BYTES`] limit.
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Creates a decoder with a custom line-length limit.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
            discarding: false,
            _marker: PhantomData,
        }
    }

    /// Feeds a chunk of bytes and returns every value it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<T> {
        let mut out = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                continue;
            }

            self.buf.extend_from_slice(head);
            let line = std::mem::take(&mut self.buf);
            if line.len() > self.max_line {
                tracing::warn!(len = line.len(), "dropping oversized line");
                continue;
            }
            if let Some(value) = decode_line(&line) {
                out.push(value);
            }
        }

        if !self.discarding {
            self.buf.extend_from_slice(rest);
            if self.buf.len() > self.max_line {
                tracing::warn!(len = self.buf.len(), "line exceeds limit, discarding");
                self.buf.clear();
                self.discarding = true;
            }
        }

        out
    }

    /// Bytes currently buffered waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl<T: DeserializeOwned> Default for LineDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<T> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            tracing::debug!(error = %e, "dropping non-UTF-8 line");
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed line");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
