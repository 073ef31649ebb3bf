use std::io;
use thiserror::Error;

/// Error types for LithTech model parsing and writing
#[derive(Error, Debug)]
pub enum ModelError {
    /// I/O error during reading or writing
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// The stream ended before a structure could be read in full
    #[error("truncated input: {0}")]
    TruncatedInput(io::Error),

    /// File type / version gate failed; callers may probe another reader
    #[error("unsupported {format} data: file type {file_type}, version {version}")]
    UnsupportedFormat {
        format: &'static str,
        file_type: u32,
        version: u32,
    },

    /// A length-prefixed string contained bytes outside the wire charset
    #[error("invalid string encoding at offset {offset}")]
    InvalidEncoding { offset: u64 },

    /// Structural damage that invalidates the whole file
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// Damage confined to one section; callers skip the section and go on
    #[error("corrupt {section} section: {reason}")]
    CorruptSection {
        section: &'static str,
        reason: String,
    },

    /// A piece whose mesh type / node binding matches no attachment rule
    #[error("piece '{piece}' has no resolvable attachment: {reason}")]
    UnresolvedAttachment { piece: String, reason: String },
}

impl From<io::Error> for ModelError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedInput(err)
        } else {
            Self::Io(err)
        }
    }
}

/// Result type using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;
