//! Error types shared by the archive layer and the filesystem view.
//!
//! [`Error`] names the kind of failure. Operations that act on a path
//! (opening, reading, seeking, listing, closing) wrap it in a [`PathError`]
//! carrying the operation name and the path the caller used.

use std::io;

use thiserror::Error;

/// Convenience alias for archive and construction results.
pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of failure reported by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The handle was already closed.
    #[error("file closed")]
    FileClosed,

    /// The filesystem was already closed.
    #[error("filesystem closed")]
    FileSystemClosed,

    /// A directory operation was applied to a file.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation was applied to a directory.
    #[error("is a directory")]
    IsDirectory,

    /// No entry exists at the requested path.
    #[error("file does not exist")]
    NotFound,

    /// The byte source is not a well-formed ZIP archive.
    #[error("invalid zip archive: {0}")]
    InvalidArchive(String),

    /// The entry uses a compression method other than STORED or DEFLATE.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// The entry is encrypted.
    #[error("encrypted entries are not supported")]
    Encrypted,

    /// A remote archive server refused or could not serve the request.
    #[error("remote archive: {0}")]
    Remote(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArchive(msg.into())
    }

    /// The closest [`io::ErrorKind`] for this error.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::NotFound => io::ErrorKind::NotFound,
            Error::NotDirectory => io::ErrorKind::NotADirectory,
            Error::IsDirectory => io::ErrorKind::IsADirectory,
            Error::InvalidArchive(_) => io::ErrorKind::InvalidData,
            Error::UnsupportedCompression(_) | Error::Encrypted => io::ErrorKind::Unsupported,
            Error::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        }
    }
}

/// An [`Error`] attached to the operation and path that produced it.
#[derive(Debug, Error)]
#[error("{op} {path}: {source}")]
pub struct PathError {
    /// Operation name, e.g. `"Open"`, `"Read"`, `"Close"`.
    pub op: &'static str,
    /// The path as given by the caller.
    pub path: String,
    pub source: Error,
}

impl PathError {
    pub fn new(op: &'static str, path: impl Into<String>, source: impl Into<Error>) -> Self {
        Self {
            op,
            path: path.into(),
            source: source.into(),
        }
    }

    /// The kind of failure.
    pub fn kind(&self) -> &Error {
        &self.source
    }

    /// Recover the `PathError` carried inside an I/O error returned by
    /// [`FileHandle`](crate::FileHandle)'s `Read` and `Seek` implementations.
    pub fn from_io_error(err: &io::Error) -> Option<&PathError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<PathError>())
    }
}

impl From<PathError> for io::Error {
    fn from(err: PathError) -> Self {
        io::Error::new(err.source.io_kind(), err)
    }
}
