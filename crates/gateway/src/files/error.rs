//! Error type shared by the file components.

use protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while operating on the volume.
///
/// Paths carried in variants are the volume-relative paths the client
/// supplied, never host paths, so the messages are safe to return.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path would leave the volume root.
    #[error("path is outside the volume: {0}")]
    PathEscape(String),

    /// The path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target name is taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The path is malformed or cannot be used for this operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The search query is unusable.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request payload is missing something.
    #[error("{0}")]
    InvalidPayload(String),

    /// A file was required.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// A directory was required.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A download was requested without selecting anything.
    #[error("no files or directories selected")]
    NoSelection,

    /// The move target lies inside the item being moved.
    #[error("cannot move {0} into itself")]
    SelfMove(String),

    /// The upload exceeds the configured size cap.
    #[error("payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Total bytes received.
        size: u64,
        /// Configured cap.
        limit: u64,
    },

    /// An encrypted file could not be decrypted.
    #[error("cannot decrypt {path}")]
    Decryption {
        path: String,
        #[source]
        source: ProtocolError,
    },

    /// Writing the ZIP container failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`FileError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    PathEscape,
    NotFound,
    AlreadyExists,
    InvalidPath,
    InvalidQuery,
    InvalidPayload,
    NotAFile,
    NotADirectory,
    NoSelection,
    SelfMove,
    PayloadTooLarge,
    Decryption,
    Io,
}

impl FileError {
    /// Returns the error kind.
    pub fn kind(&self) -> FileErrorKind {
        match self {
            Self::PathEscape(_) => FileErrorKind::PathEscape,
            Self::NotFound(_) => FileErrorKind::NotFound,
            Self::AlreadyExists(_) => FileErrorKind::AlreadyExists,
            Self::InvalidPath(_) => FileErrorKind::InvalidPath,
            Self::InvalidQuery(_) => FileErrorKind::InvalidQuery,
            Self::InvalidPayload(_) => FileErrorKind::InvalidPayload,
            Self::NotAFile(_) => FileErrorKind::NotAFile,
            Self::NotADirectory(_) => FileErrorKind::NotADirectory,
            Self::NoSelection => FileErrorKind::NoSelection,
            Self::SelfMove(_) => FileErrorKind::SelfMove,
            Self::PayloadTooLarge { .. } => FileErrorKind::PayloadTooLarge,
            Self::Decryption { .. } => FileErrorKind::Decryption,
            Self::Archive(_) | Self::Io(_) => FileErrorKind::Io,
        }
    }
}

/// Result alias for file operations.
pub type FileResult<T> = Result<T, FileError>;
