//! Streaming removal of ANSI escape sequences
//!
//! Piped input is often colourised terminal output. Before it is framed into a
//! `data` block the client strips CSI sequences (`ESC [ ... final`) so the editor
//! receives plain text. The filter is restartable: state carries over between
//! chunks, so a sequence split across two reads is still removed whole.
//!
//! An `ESC` that is not followed by `[` swallows the byte after it as well.

const ESC: u8 = 0x1b;

/// Position of the filter within an escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeState {
    /// Outside any sequence, bytes are copied
    #[default]
    Plain,
    /// Just saw `ESC`
    Escape,
    /// Inside a CSI sequence, waiting for its final byte
    AnsiSequence,
}

impl EscapeState {
    /// Advance by one byte, returning the next state and whether the byte is kept
    fn step(self, byte: u8) -> (Self, bool) {
        match self {
            EscapeState::Plain if byte == ESC => (EscapeState::Escape, false),
            EscapeState::Plain => (EscapeState::Plain, true),
            EscapeState::Escape if byte == b'[' => (EscapeState::AnsiSequence, false),
            EscapeState::Escape => (EscapeState::Plain, false),
            EscapeState::AnsiSequence if (0x40..=0x7e).contains(&byte) => {
                (EscapeState::Plain, false)
            }
            EscapeState::AnsiSequence => (EscapeState::AnsiSequence, false),
        }
    }
}

/// Strip escape sequences from one chunk of a stream.
///
/// Returns the kept bytes and the state to pass in with the next chunk.
pub fn strip_escapes(state: EscapeState, input: &[u8]) -> (Vec<u8>, EscapeState) {
    let mut output = Vec::with_capacity(input.len());
    let mut state = state;
    for &byte in input {
        let (next, keep) = state.step(byte);
        if keep {
            output.push(byte);
        }
        state = next;
    }
    (output, state)
}

/// Escape filter that remembers its state and whether it ever removed anything
#[derive(Debug, Default)]
pub struct EscapeFilter {
    state: EscapeState,
    stripped: bool,
}

impl EscapeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter `buf` in place, truncating it to the kept bytes
    pub fn filter_in_place(&mut self, buf: &mut Vec<u8>) {
        let before = buf.len();
        let mut state = self.state;
        buf.retain(|&byte| {
            let (next, keep) = state.step(byte);
            state = next;
            keep
        });
        self.state = state;
        self.stripped |= buf.len() != before;
    }

    /// Filter a chunk into a new buffer
    pub fn filter(&mut self, input: &[u8]) -> Vec<u8> {
        let (output, state) = strip_escapes(self.state, input);
        self.stripped |= output.len() != input.len();
        self.state = state;
        output
    }

    pub fn state(&self) -> EscapeState {
        self.state
    }

    /// True once any byte has been removed from the stream
    pub fn stripped(&self) -> bool {
        self.stripped
    }
}
