use std::io::{BufWriter, ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{self, CodecError, EncodeContext, EncodeSummary};
use crate::decoder::Decoder;
use crate::protocol::{DocumentRequest, ResponseEvent};

/// Read size for the reply loop
pub const READ_CHUNK_SIZE: usize = 1024;

/// Errors from a session with the editor
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot connect to {} ({source}): is the editor running?", .path.display())]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read greeting: {0}")]
    Greeting(std::io::Error),
    #[error("failed to send request: {0}")]
    Write(std::io::Error),
    #[error("failed to encode request: {0}")]
    Codec(#[from] CodecError),
    #[error("failed to read reply: {0}")]
    Read(std::io::Error),
    #[error("failed to write output: {0}")]
    Output(std::io::Error),
}

/// Connect to the editor socket
pub fn connect(path: &Path) -> Result<UnixStream, SessionError> {
    UnixStream::connect(path).map_err(|source| SessionError::Connect {
        path: path.to_path_buf(),
        source,
    })
}

/// Session behaviour
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Read and discard the line the editor sends on accept
    pub read_greeting: bool,
    pub chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_greeting: true,
            chunk_size: READ_CHUNK_SIZE,
        }
    }
}

/// Outcome of the reply phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub greeting: Option<String>,
    /// `close` commands received
    pub closed: usize,
    /// Arguments without meaning to the client, in arrival order
    pub arguments: Vec<(String, String)>,
    /// Payload bytes written to the output
    pub payload_bytes: u64,
    /// Bytes of a `data` block cut off by end of stream
    pub missing_bytes: Option<usize>,
}

/// One request batch over one connection
///
/// Sends everything first, then relays replies until the editor hangs up.
pub struct Session<C: Read + Write> {
    conn: C,
    options: SessionOptions,
    decoder: Decoder,
    report: SessionReport,
}

impl<C: Read + Write> Session<C> {
    pub fn new(conn: C, options: SessionOptions) -> Self {
        Self {
            conn,
            options,
            decoder: Decoder::new(),
            report: SessionReport::default(),
        }
    }

    /// Encode and send `batch`, then copy reply payload into `sink` until EOF.
    ///
    /// The connection is dropped, and so closed, before returning.
    pub fn run(
        mut self,
        batch: &[DocumentRequest],
        input: &mut impl Read,
        ctx: &EncodeContext,
        sink: &mut impl Write,
    ) -> Result<(SessionReport, EncodeSummary), SessionError> {
        self.read_greeting()?;
        let summary = self.send_batch(batch, input, ctx)?;
        self.receive(sink)?;
        Ok((self.report, summary))
    }

    /// Like [`Session::run`] for a batch that is already encoded
    pub fn run_encoded(
        mut self,
        batch: &[u8],
        sink: &mut impl Write,
    ) -> Result<SessionReport, SessionError> {
        self.read_greeting()?;
        self.send_bytes(batch)?;
        self.receive(sink)?;
        Ok(self.report)
    }

    /// Read the line the editor sends on accept, if configured to expect one
    pub fn read_greeting(&mut self) -> Result<(), SessionError> {
        if !self.options.read_greeting {
            return Ok(());
        }
        let mut buf = vec![0u8; self.options.chunk_size.max(1)];
        let n = loop {
            match self.conn.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Greeting(e)),
            }
        };
        let greeting = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
        debug!(%greeting, "Connected");
        self.report.greeting = Some(greeting);
        Ok(())
    }

    /// Encode straight onto the connection
    pub fn send_batch(
        &mut self,
        batch: &[DocumentRequest],
        input: &mut impl Read,
        ctx: &EncodeContext,
    ) -> Result<EncodeSummary, SessionError> {
        let mut writer = BufWriter::new(&mut self.conn);
        let summary = codec::write_batch(&mut writer, batch, input, ctx)?;
        debug!(documents = batch.len(), stdin_bytes = summary.stdin_bytes, "Sent batch");
        Ok(summary)
    }

    /// Write all of `bytes`, resuming after short writes
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.conn.write_all(bytes).map_err(SessionError::Write)?;
        self.conn.flush().map_err(SessionError::Write)?;
        debug!(bytes = bytes.len(), "Sent batch");
        Ok(())
    }

    /// Relay replies into `sink` until the editor closes the connection
    pub fn receive(&mut self, sink: &mut impl Write) -> Result<(), SessionError> {
        let mut buf = vec![0u8; self.options.chunk_size.max(1)];
        loop {
            let n = match self.conn.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Read(e)),
            };
            for event in self.decoder.feed(&buf[..n]) {
                self.dispatch(event, sink)?;
            }
        }

        self.report.missing_bytes = self.decoder.finish();
        if let Some(missing) = self.report.missing_bytes {
            warn!(missing, "Connection closed inside a data block");
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        event: ResponseEvent,
        sink: &mut impl Write,
    ) -> Result<(), SessionError> {
        match event {
            ResponseEvent::DataChunk(bytes) => {
                sink.write_all(&bytes).map_err(SessionError::Output)?;
                sink.flush().map_err(SessionError::Output)?;
                self.report.payload_bytes += bytes.len() as u64;
            }
            ResponseEvent::CloseSignal => {
                debug!("Document closed");
                self.report.closed += 1;
            }
            ResponseEvent::Argument { key, value } => {
                debug!(%key, %value, "Reply argument");
                self.report.arguments.push((key, value));
            }
        }
        Ok(())
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}
