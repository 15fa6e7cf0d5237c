//! Error types for the persistence layer.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`Error`], mirroring the reporting channel's
/// error-kind code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed token, token too long, binary bytes in a text stream.
    Lexical,
    /// Expected keyword/bracket not found, wrong arity.
    Syntactic,
    /// Structurally valid input with invalid meaning.
    Semantic,
    /// Sync-word mismatch, unterminated list, unknown kind tag.
    BinaryProtocol,
    /// File, stream table or I/O failures.
    Resource,
}

/// Binary wire protocol failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinaryError {
    /// Neither the word nor its byte-swapped form carries the sync magic
    #[error("bad sync word 0x{0:08x}")]
    BadSync(u32),

    /// Structure size embedded in the sync word differs from ours
    #[error("structure size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u32, actual: u32 },

    /// A sync word was valid but not the one the grammar requires here
    #[error("unexpected block kind {actual} (expected {expected})")]
    UnexpectedKind { expected: u32, actual: u32 },

    /// Object kind tag not known to this reader
    #[error("unknown object kind {0}")]
    UnknownKind(u32),

    /// A variable-length list was not closed by its end marker
    #[error("unterminated {0} list")]
    Unterminated(&'static str),

    /// The stream ended in the middle of a record
    #[error("binary stream truncated")]
    Truncated,
}

/// Main error type for reading and writing geometry.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed token
    #[error("line {line}: {msg}")]
    Lexical { line: u32, msg: String },

    /// Control characters found while lexing text
    #[error("line {line}: binary data in a text stream, was a binary file opened as text?")]
    BinaryAsText { line: u32 },

    /// Grammar violation
    #[error("line {line}: {msg}")]
    Syntax { line: u32, msg: String },

    /// Meaningless content (bad dimension, bad index, invalid geometry)
    #[error("{}{msg}", line.map(|l| format!("line {l}: ")).unwrap_or_default())]
    Semantic { line: Option<u32>, msg: String },

    /// Element of a chain does not have the kind the operation expects
    #[error("kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    /// Instance refers to a name that is not in the collection
    #[error("instance target not found: {0}")]
    UnknownInstance(String),

    /// Nothing was read at the top level
    #[error("empty file, no objects found")]
    EmptyFile,

    /// Binary protocol error
    #[error("binary protocol: {0}")]
    Binary(#[from] BinaryError),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// No free slot left in the stream table
    #[error("stream table exhausted ({0} streams open)")]
    StreamTableFull(usize),

    /// Handle does not name an open stream
    #[error("invalid stream handle {0}")]
    InvalidHandle(usize),

    /// Stream is tagged with a format the native readers do not handle
    #[error("stream format {0} is handled by an external loader")]
    ForeignFormat(String),

    /// Operation does not match the stream's mode
    #[error("stream {0} is not open for {1}")]
    WrongMode(usize, &'static str),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a lexical error at `line`.
    pub fn lexical(line: u32, msg: impl Into<String>) -> Self {
        Self::Lexical { line, msg: msg.into() }
    }

    /// Create a syntax error at `line`.
    pub fn syntax(line: u32, msg: impl Into<String>) -> Self {
        Self::Syntax { line, msg: msg.into() }
    }

    /// Create a semantic error at `line`.
    pub fn semantic(line: u32, msg: impl Into<String>) -> Self {
        Self::Semantic { line: Some(line), msg: msg.into() }
    }

    /// Create a semantic error without position (binary streams, writers).
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Semantic { line: None, msg: msg.into() }
    }

    /// Create a kind mismatch error.
    pub fn kind_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::KindMismatch { expected: expected.into(), actual: actual.into() }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lexical { .. } | Self::BinaryAsText { .. } | Self::Utf8(_) => ErrorKind::Lexical,
            Self::Syntax { .. } => ErrorKind::Syntactic,
            Self::Semantic { .. }
            | Self::KindMismatch { .. }
            | Self::UnknownInstance(_)
            | Self::EmptyFile => ErrorKind::Semantic,
            Self::Binary(_) => ErrorKind::BinaryProtocol,
            Self::FileNotFound(_)
            | Self::StreamTableFull(_)
            | Self::InvalidHandle(_)
            | Self::ForeignFormat(_)
            | Self::WrongMode(..)
            | Self::Io(_) => ErrorKind::Resource,
        }
    }

    /// Source line for text stream errors. Binary errors carry none.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Lexical { line, .. }
            | Self::BinaryAsText { line }
            | Self::Syntax { line, .. } => Some(*line),
            Self::Semantic { line, .. } => *line,
            _ => None,
        }
    }
}

/// Result type alias for geometry I/O.
pub type Result<T> = std::result::Result<T, Error>;
