//! Wire protocol spoken with the companion editor
//!
//! One connection carries one request batch. The client announces each document
//! with an `open` command followed by `key: value` arguments, and ends the batch
//! with a lone `.`. The editor answers with the same line style for as long as it
//! keeps the connection open.
//!
//! # Wire Format
//!
//! Lines are ASCII terminated by `\r\n`. A `data` argument is followed by exactly
//! the announced number of raw bytes, with no line terminator after them.
//!
//! ## Request
//! ```text
//! open
//! path: /home/me/notes.txt
//! display-name:
//! wait: yes
//! ...
//! <blank line>
//! open
//! data: 11
//! hello worlddisplay-name: untitled (stdin)
//! ...
//! <blank line>
//! .
//! ```
//!
//! ## Response
//! ```text
//! close
//! data: 5
//! HELLO
//! <blank line>
//! ```

/// Line terminator on the wire
pub const EOL: &str = "\r\n";

/// Command opening a document in a request
pub const OPEN: &str = "open";

/// Command reporting a closed document in a response
pub const CLOSE: &str = "close";

/// Line ending a request batch
pub const END_OF_BATCH: &str = ".";

/// Scheme marking a command-line argument as a document reference
pub const UUID_PREFIX: &str = "uuid://";

/// Display name for documents read from stdin
pub const STDIN_DISPLAY_NAME: &str = "untitled (stdin)";

/// Argument keys understood by the editor
pub mod keys {
    pub const PATH: &str = "path";
    pub const UUID: &str = "uuid";
    pub const DISPLAY_NAME: &str = "display-name";
    pub const WAIT: &str = "wait";
    pub const REACTIVATE: &str = "re-activate";
    pub const DATA: &str = "data";
    pub const DATA_ON_CLOSE: &str = "data-on-close";
    pub const SELECTION: &str = "selection";
    pub const FILE_TYPE: &str = "file-type";
    pub const PROJECT_UUID: &str = "project-uuid";
    pub const ADD_TO_RECENTS: &str = "add-to-recents";
    pub const CHANGE_DIRECTORY: &str = "change-directory";
    pub const AUTHORIZATION: &str = "authorization";
}

/// Encode a boolean argument value
pub fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// A boolean option the user may leave unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toggle {
    #[default]
    Unset,
    Enable,
    Disable,
}

impl Toggle {
    pub fn is_enabled(self) -> bool {
        self == Toggle::Enable
    }

    pub fn is_set(self) -> bool {
        self != Toggle::Unset
    }

    /// Resolve to a definite value, using `default` when unset
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Toggle::Unset => default,
            Toggle::Enable => true,
            Toggle::Disable => false,
        }
    }
}

impl From<bool> for Toggle {
    fn from(flag: bool) -> Self {
        if flag { Toggle::Enable } else { Toggle::Disable }
    }
}

/// Where the content of a document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file on disk (absolute path)
    Path(String),
    /// The invoking process's standard input
    Stdin,
    /// A document already open in the editor
    UuidRef(String),
}

impl Source {
    /// Interpret a command-line file argument
    ///
    /// `-` reads stdin and `uuid://<id>` refers to an open document. Anything else
    /// is a path, taken as given.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Source::Stdin
        } else if let Some(id) = arg.strip_prefix(UUID_PREFIX) {
            Source::UuidRef(id.to_string())
        } else {
            Source::Path(arg.to_string())
        }
    }
}

/// One document in an outbound batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    pub source: Source,
    pub display_name: Option<String>,
    /// Caret placement, e.g. `12` or `12:4`
    pub selection: Option<String>,
    pub file_type: Option<String>,
    /// Falls back to the batch default when unset
    pub project_uuid: Option<String>,
    pub wait: Toggle,
    /// Follows the resolved `wait` when unset
    pub reactivate: Toggle,
    pub add_to_recents: Toggle,
    pub change_directory: Toggle,
    pub authorization: Option<String>,
}

impl DocumentRequest {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            display_name: None,
            selection: None,
            file_type: None,
            project_uuid: None,
            wait: Toggle::Unset,
            reactivate: Toggle::Unset,
            add_to_recents: Toggle::Unset,
            change_directory: Toggle::Unset,
            authorization: None,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(Source::Path(path.into()))
    }

    pub fn stdin() -> Self {
        Self::new(Source::Stdin)
    }

    pub fn uuid(id: impl Into<String>) -> Self {
        Self::new(Source::UuidRef(id.into()))
    }
}

/// Event decoded from the editor's replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// A document from the batch was closed
    CloseSignal,
    /// Argument line without special meaning to the client
    Argument { key: String, value: String },
    /// Raw bytes of the current `data` block
    DataChunk(Vec<u8>),
}

/// Split an argument line into key and value.
///
/// The value starts two bytes after the first `:` to skip the conventional
/// `": "` separator; a shorter tail gives an empty value. Lines without `:` are
/// not arguments.
pub fn split_argument(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    let value = line.get(colon + 2..).unwrap_or_default();
    Some((&line[..colon], value))
}

/// Parse a `data` length the way `strtol` would: leading digits, else zero.
///
/// Returns `None` when no digit is present so the caller can report it.
pub fn parse_length(value: &[u8]) -> Option<usize> {
    let trimmed = value.trim_ascii_start();
    let digits = trimmed.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    Some(trimmed[..digits].iter().fold(0usize, |acc, &b| {
        acc.saturating_mul(10).saturating_add(usize::from(b - b'0'))
    }))
}
