//! Incremental decoder for the editor's replies
//!
//! Bytes arrive in whatever pieces the socket hands out. The decoder keeps what
//! it has not consumed yet and turns complete lines into [`ResponseEvent`]s. A
//! `data: N` argument switches it into raw mode, where the next `N` bytes are
//! passed through untouched no matter what they contain.

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::protocol::{keys, parse_length, split_argument, ResponseEvent, CLOSE};

/// Pending unterminated line length that gets a trace event
pub const LONG_LINE_THRESHOLD: usize = 64 * 1024;

/// The pending length went past another multiple of [`LONG_LINE_THRESHOLD`]
fn crosses_long_line_threshold(before: usize, after: usize) -> bool {
    before / LONG_LINE_THRESHOLD < after / LONG_LINE_THRESHOLD
}

/// Growable buffer of received bytes not yet consumed by the decoder
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    buf: BytesMut,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remove and return up to `n` bytes from the front
    pub fn consume_front(&mut self, n: usize) -> BytesMut {
        self.buf.split_to(n.min(self.buf.len()))
    }

    /// Remove the next `\n`-terminated line, without its `\n` or a trailing `\r`.
    ///
    /// Returns `None` and leaves the buffer alone while the line is incomplete.
    pub fn next_line(&mut self) -> Option<BytesMut> {
        let eol = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line = self.buf.split_to(eol);
        self.buf.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(line)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Where the decoder is within the reply stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Between commands
    #[default]
    AwaitingCommand,
    /// Reading the arguments of a command
    AwaitingArguments,
    /// Passing raw bytes of a `data` block through
    AwaitingData { remaining: usize },
    /// The peer closed the connection
    Terminated,
}

impl DecoderState {
    /// Apply one complete line.
    ///
    /// Raw data is never handled here; callers drain `AwaitingData` first.
    pub fn on_line(self, line: &[u8]) -> (Self, Option<ResponseEvent>) {
        match self {
            DecoderState::AwaitingCommand => {
                if line == CLOSE.as_bytes() {
                    (DecoderState::AwaitingArguments, Some(ResponseEvent::CloseSignal))
                } else {
                    if !line.is_empty() {
                        trace!(line = %String::from_utf8_lossy(line), "Ignoring unknown command");
                    }
                    (DecoderState::AwaitingCommand, None)
                }
            }
            DecoderState::AwaitingArguments => {
                if line.is_empty() {
                    return (DecoderState::AwaitingCommand, None);
                }
                let Some((key, value)) = split_argument(line) else {
                    trace!(line = %String::from_utf8_lossy(line), "Dropping malformed argument");
                    return (self, None);
                };
                if key == keys::DATA.as_bytes() {
                    let remaining = parse_length(value).unwrap_or_else(|| {
                        warn!(
                            value = %String::from_utf8_lossy(value),
                            "Invalid data length, treating as empty"
                        );
                        0
                    });
                    let next = if remaining == 0 {
                        DecoderState::AwaitingArguments
                    } else {
                        DecoderState::AwaitingData { remaining }
                    };
                    return (next, None);
                }
                let event = ResponseEvent::Argument {
                    key: String::from_utf8_lossy(key).into_owned(),
                    value: String::from_utf8_lossy(value).into_owned(),
                };
                (self, Some(event))
            }
            DecoderState::AwaitingData { .. } | DecoderState::Terminated => (self, None),
        }
    }
}

/// Streaming reply decoder
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
    buffer: ReceiveBuffer,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes received but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed freshly read bytes, returning every event they complete
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ResponseEvent> {
        let mut events = Vec::new();
        if self.state == DecoderState::Terminated {
            return events;
        }

        let pending_before = self.buffer.len();
        self.buffer.extend(bytes);
        loop {
            match self.state {
                DecoderState::Terminated => break,
                DecoderState::AwaitingData { remaining } => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    let chunk = self.buffer.consume_front(remaining);
                    let remaining = remaining - chunk.len();
                    events.push(ResponseEvent::DataChunk(chunk.to_vec()));
                    self.state = if remaining == 0 {
                        DecoderState::AwaitingArguments
                    } else {
                        DecoderState::AwaitingData { remaining }
                    };
                }
                state => {
                    let Some(line) = self.buffer.next_line() else {
                        break;
                    };
                    let (next, event) = state.on_line(&line);
                    self.state = next;
                    events.extend(event);
                }
            }
        }

        let pending = self.buffer.len();
        if !matches!(self.state, DecoderState::AwaitingData { .. })
            && crosses_long_line_threshold(pending_before, pending)
        {
            trace!(pending, "Reply line still unterminated");
        }
        events
    }

    /// Mark end of stream.
    ///
    /// Returns how many bytes of a `data` block never arrived, if any.
    pub fn finish(&mut self) -> Option<usize> {
        let missing = match self.state {
            DecoderState::AwaitingData { remaining } => Some(remaining),
            _ => None,
        };
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "Discarding unterminated line at end of stream");
            self.buffer.clear();
        }
        self.state = DecoderState::Terminated;
        missing
    }
}
