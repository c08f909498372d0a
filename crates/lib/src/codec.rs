use std::io::{ErrorKind, Read, Write};

use thiserror::Error;
use tracing::{debug, warn};

use crate::escape::EscapeFilter;
use crate::protocol::{
    keys, yes_no, DocumentRequest, Source, Toggle, END_OF_BATCH, EOL, OPEN, STDIN_DISPLAY_NAME,
};

/// Read size used when framing stdin into `data` blocks
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Facts about the invocation that decide how unset options resolve
#[derive(Debug, Clone)]
pub struct EncodeContext {
    /// Stdin is not a terminal
    pub stdin_is_pipe: bool,
    /// Stdout is not a terminal
    pub stdout_is_pipe: bool,
    /// Document the invoking editor command runs in, used for empty pipes
    pub current_document: Option<String>,
    /// Project for requests that do not name one
    pub default_project: Option<String>,
    /// Whether ANSI escapes from stdin are kept
    pub keep_escapes: Toggle,
    pub chunk_size: usize,
}

impl Default for EncodeContext {
    fn default() -> Self {
        Self {
            stdin_is_pipe: false,
            stdout_is_pipe: false,
            current_document: None,
            default_project: None,
            keep_escapes: Toggle::Unset,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What happened while encoding a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Escape sequences were removed from stdin
    pub stripped_escapes: bool,
    /// Bytes of stdin framed into `data` blocks
    pub stdin_bytes: u64,
}

impl EncodeSummary {
    /// The user should hear about stripping only if they did not choose either way
    pub fn should_warn_about_escapes(&self, keep_escapes: Toggle) -> bool {
        self.stripped_escapes && !keep_escapes.is_set()
    }
}

/// Write a whole request batch, terminated by `.`.
///
/// Documents with a [`Source::Stdin`] source pull their content from `input`.
pub fn write_batch(
    writer: &mut impl Write,
    batch: &[DocumentRequest],
    input: &mut impl Read,
    ctx: &EncodeContext,
) -> Result<EncodeSummary, CodecError> {
    let mut summary = EncodeSummary::default();
    for doc in batch {
        write_document(writer, doc, input, ctx, &mut summary)?;
    }
    write_line(writer, END_OF_BATCH)?;
    writer.flush()?;
    Ok(summary)
}

/// Encode a batch into memory
pub fn encode_batch(
    batch: &[DocumentRequest],
    input: &mut impl Read,
    ctx: &EncodeContext,
) -> Result<(Vec<u8>, EncodeSummary), CodecError> {
    let mut buf = Vec::new();
    let summary = write_batch(&mut buf, batch, input, ctx)?;
    Ok((buf, summary))
}

fn write_document(
    writer: &mut impl Write,
    doc: &DocumentRequest,
    input: &mut impl Read,
    ctx: &EncodeContext,
    summary: &mut EncodeSummary,
) -> Result<(), CodecError> {
    write_line(writer, OPEN)?;

    match &doc.source {
        Source::Stdin => {
            let framed = write_stdin_data(writer, input, ctx, summary)?;
            summary.stdin_bytes += framed;

            let nothing_piped = ctx.stdin_is_pipe && framed == 0;
            match ctx.current_document.as_deref() {
                Some(current) if nothing_piped && !doc.wait.is_enabled() => {
                    debug!(uuid = current, "Empty pipe, referencing current document");
                    write_key_pair(writer, keys::UUID, current)?;
                }
                _ => {
                    let wait = doc.wait.resolve(ctx.stdout_is_pipe);
                    let name = doc.display_name.as_deref().unwrap_or(STDIN_DISPLAY_NAME);
                    write_key_pair(writer, keys::DISPLAY_NAME, name)?;
                    write_key_pair(
                        writer,
                        keys::DATA_ON_CLOSE,
                        yes_no(wait && ctx.stdout_is_pipe),
                    )?;
                    write_key_pair(writer, keys::WAIT, yes_no(wait))?;
                    write_key_pair(writer, keys::REACTIVATE, yes_no(doc.reactivate.resolve(wait)))?;
                }
            }
        }
        Source::UuidRef(id) => {
            write_key_pair(writer, keys::UUID, id)?;
        }
        Source::Path(path) => {
            let wait = doc.wait.resolve(false);
            write_key_pair(writer, keys::PATH, path)?;
            write_key_pair(
                writer,
                keys::DISPLAY_NAME,
                doc.display_name.as_deref().unwrap_or_default(),
            )?;
            write_key_pair(writer, keys::WAIT, yes_no(wait))?;
            write_key_pair(writer, keys::REACTIVATE, yes_no(doc.reactivate.resolve(wait)))?;
        }
    }

    if let Some(token) = &doc.authorization {
        write_key_pair(writer, keys::AUTHORIZATION, token)?;
    }

    let project = doc
        .project_uuid
        .as_deref()
        .or(ctx.default_project.as_deref())
        .unwrap_or_default();

    write_key_pair(writer, keys::SELECTION, doc.selection.as_deref().unwrap_or_default())?;
    write_key_pair(writer, keys::FILE_TYPE, doc.file_type.as_deref().unwrap_or_default())?;
    write_key_pair(writer, keys::PROJECT_UUID, project)?;
    write_key_pair(writer, keys::ADD_TO_RECENTS, yes_no(doc.add_to_recents.resolve(false)))?;
    write_key_pair(
        writer,
        keys::CHANGE_DIRECTORY,
        yes_no(doc.change_directory.resolve(false)),
    )?;

    writer.write_all(EOL.as_bytes())?;
    Ok(())
}

/// Frame everything readable from `input` as `data` blocks.
///
/// Returns the number of payload bytes written. A failing read ends the input
/// rather than the batch.
fn write_stdin_data(
    writer: &mut impl Write,
    input: &mut impl Read,
    ctx: &EncodeContext,
    summary: &mut EncodeSummary,
) -> Result<u64, CodecError> {
    let mut filter = (!ctx.keep_escapes.is_enabled()).then(EscapeFilter::new);
    let mut buf = vec![0u8; ctx.chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let len = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Stopped reading stdin: {e}");
                break;
            }
        };

        let mut chunk = buf[..len].to_vec();
        // A chunk the filter empties is still framed, as `data: 0`
        if let Some(filter) = filter.as_mut() {
            filter.filter_in_place(&mut chunk);
        }

        write_key_pair(writer, keys::DATA, &chunk.len().to_string())?;
        writer.write_all(&chunk)?;
        total += chunk.len() as u64;
    }

    if let Some(filter) = filter {
        summary.stripped_escapes |= filter.stripped();
    }
    Ok(total)
}

/// Write a `key: value` argument line
pub fn write_key_pair(writer: &mut impl Write, key: &str, value: &str) -> Result<(), CodecError> {
    writer.write_all(format!("{key}: {value}{EOL}").as_bytes())?;
    Ok(())
}

fn write_line(writer: &mut impl Write, line: &str) -> Result<(), CodecError> {
    writer.write_all(format!("{line}{EOL}").as_bytes())?;
    Ok(())
}

/// Encoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
