//! Newline-delimited JSON framing.
//!
//! Network reads do not line up with JSON objects: a read may carry several
//! lines or stop in the middle of one. [`NdjsonFramer`] reassembles complete
//! lines and [`frame_ndjson`] lifts it over a byte stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::GenerationError;
use crate::service::FrameStream;

/// Longest reply line accepted before the stream is treated as broken.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental splitter from byte chunks to complete lines.
#[derive(Debug)]
pub struct NdjsonFramer {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no newline.
    scanned: usize,
    max_line: usize,
}

impl Default for NdjsonFramer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl NdjsonFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    /// Feed one chunk, returning every line it completes in order.
    ///
    /// Blank lines are skipped and a trailing `\r` is removed. A line longer
    /// than the limit is a framing error, whether complete or still pending.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, GenerationError> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let raw: Vec<u8> = self.buf.drain(..=end).collect();
            from = 0;
            let decoded = self
                .check_len(raw.len() - 1)
                .and_then(|()| decode_line(&raw[..raw.len() - 1]));
            match decoded {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => {}
                Err(err) => {
                    self.reset();
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.check_len(self.buf.len()) {
            self.reset();
            return Err(err);
        }
        self.scanned = self.buf.len();
        Ok(lines)
    }

    /// Flush an unterminated trailing line at end-of-data.
    pub fn finish(&mut self) -> Result<Option<String>, GenerationError> {
        let raw = std::mem::take(&mut self.buf);
        self.scanned = 0;
        decode_line(&raw)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn check_len(&self, len: usize) -> Result<(), GenerationError> {
        if len > self.max_line {
            return Err(GenerationError::Framing(format!(
                "reply line exceeds {} bytes",
                self.max_line
            )));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>, GenerationError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| GenerationError::Framing(format!("invalid UTF-8 in reply line: {e}")))?;
    let text = text.strip_suffix('\r').unwrap_or(text);
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}

struct FrameState {
    chunks: stream::BoxStream<'static, Result<Bytes, GenerationError>>,
    framer: NdjsonFramer,
    ready: VecDeque<String>,
    finished: bool,
}

/// Turn a byte stream into a stream of NDJSON frames.
///
/// Frames are yielded in arrival order. The first error ends the stream.
pub fn frame_ndjson<S, E>(chunks: S) -> FrameStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<GenerationError> + Send + 'static,
{
    let state = FrameState {
        chunks: chunks.map(|chunk| chunk.map_err(Into::into)).boxed(),
        framer: NdjsonFramer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(bytes)) => match state.framer.push(&bytes) {
                    Ok(lines) => state.ready.extend(lines),
                    Err(err) => {
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    match state.framer.finish() {
                        Ok(Some(line)) => state.ready.push_back(line),
                        Ok(None) => {}
                        Err(err) => return Some((Err(err), state)),
                    }
                }
            }
        }
    })
    .boxed()
}
